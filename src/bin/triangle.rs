use hello_ngin::{config::AppConfig, flow::run, samples::Triangle, window::WindowConfig};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env(WindowConfig::new("Simple example", 960, 540));
    run::<Triangle>(config)
}
