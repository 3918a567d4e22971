use hello_ngin::{config::AppConfig, flow::run, samples::ImageViewer, window::WindowConfig};

fn main() -> anyhow::Result<()> {
    // Negative sizes: the primary monitor minus 160x120 pixels.
    let config = AppConfig::from_env(WindowConfig::new("Image viewer", -160, -120));
    run::<ImageViewer>(config)
}
