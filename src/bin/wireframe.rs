use hello_ngin::{config::AppConfig, flow::run, samples::Wireframe, window::WindowConfig};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env(WindowConfig::new("Simple example", 960, 540));
    run::<Wireframe>(config)
}
