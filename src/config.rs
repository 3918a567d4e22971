//! Program configuration.
//!
//! Each program starts from its own defaults ([`AppConfig::new`]) and lets the
//! environment override them ([`AppConfig::from_env`]):
//!
//! | variable                 | meaning                                        |
//! |--------------------------|------------------------------------------------|
//! | `HELLO_NGIN_ASSETS`      | asset root directory                           |
//! | `HELLO_NGIN_WINDOW_SIZE` | `WIDTHxHEIGHT`, non-positive values allowed    |
//! | `HELLO_NGIN_MESH`        | mesh file of the wireframe program             |
//! | `HELLO_NGIN_IMAGE`       | image file of the image viewer                 |
//! | `HELLO_NGIN_FONT`        | optional TTF/OTF font for the UI               |
//!
//! Unparseable values are logged and ignored.

use std::path::PathBuf;

use crate::{context::ContextConfig, logging::LoggingConfig, window::WindowConfig};

pub const ENV_ASSETS: &str = "HELLO_NGIN_ASSETS";
pub const ENV_WINDOW_SIZE: &str = "HELLO_NGIN_WINDOW_SIZE";
pub const ENV_MESH: &str = "HELLO_NGIN_MESH";
pub const ENV_IMAGE: &str = "HELLO_NGIN_IMAGE";
pub const ENV_FONT: &str = "HELLO_NGIN_FONT";

pub const DEFAULT_MESH: &str = "models/cube.obj";
pub const DEFAULT_IMAGE: &str = "images/checker.png";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub context: ContextConfig,
    pub logging: LoggingConfig,
    pub assets: PathBuf,
    pub mesh_file: String,
    pub image_file: String,
    pub font_file: Option<String>,
}

impl AppConfig {
    pub fn new(window: WindowConfig) -> Self {
        Self {
            window,
            context: ContextConfig::default(),
            logging: LoggingConfig::default(),
            assets: default_asset_root(),
            mesh_file: DEFAULT_MESH.to_string(),
            image_file: DEFAULT_IMAGE.to_string(),
            font_file: None,
        }
    }

    pub fn from_env(window: WindowConfig) -> Self {
        Self::from_lookup(window, |key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(window: WindowConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(window);
        if let Some(root) = lookup(ENV_ASSETS) {
            config.assets = PathBuf::from(root);
        }
        if let Some(size) = lookup(ENV_WINDOW_SIZE) {
            match parse_window_size(&size) {
                Some((width, height)) => {
                    config.window.width = width;
                    config.window.height = height;
                }
                None => log::warn!("ignoring {ENV_WINDOW_SIZE}={size:?}, expected WIDTHxHEIGHT"),
            }
        }
        if let Some(mesh) = lookup(ENV_MESH) {
            config.mesh_file = mesh;
        }
        if let Some(image) = lookup(ENV_IMAGE) {
            config.image_file = image;
        }
        config.font_file = lookup(ENV_FONT).filter(|f| !f.trim().is_empty());
        config
    }
}

pub fn default_asset_root() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))
}

/// Parses `WIDTHxHEIGHT`; both sides may be zero or negative.
pub fn parse_window_size(value: &str) -> Option<(i32, i32)> {
    let (width, height) = value.trim().split_once(['x', 'X'])?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}
