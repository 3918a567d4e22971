//! hello-ngin
//!
//! Three small demonstration programs on top of a thin rendering layer over
//! wgpu: a triangle, a wireframe mesh and an image viewer with a UI overlay.
//! Resources are created up front through a [`context::RenderContext`], held
//! by scope guards that release them before the context goes away, and every
//! frame is recorded into a [`render::CommandBuffer`] and submitted as a whole.
//!
//! High-level modules
//! - `window` / `input`: window creation, close flag and pointer state
//! - `resources`: asynchronous loading of shaders, meshes, images and fonts
//! - `context`: the rendering context seam and its wgpu implementation
//! - `headless`: a GPU-less rendering context that records what it is asked to do
//!   (feature `headless`, enabled for the integration tests)
//! - `data_structures`: handles, scope guards, descriptors, mesh and transform data
//! - `pipelines`: render pipeline descriptions
//! - `render`: command recording and validation
//! - `flow`: the frame loop and the program driver
//! - `ui`: the egui overlay, painted through `egui_wgpu`
//! - `samples`: the three programs
//! - `config` / `logging`: program configuration and logger setup
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
#[cfg(any(test, feature = "headless"))]
pub mod headless;
pub mod input;
pub mod logging;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod samples;
pub mod ui;
pub mod window;

// Re-exports commonly used crates for convenience in downstream code.
pub use cgmath;
pub use egui;
pub use egui_wgpu;
pub use wgpu;
pub use winit;
