//! The three demonstration programs.
//!
//! Each one is a [`Sample`](crate::flow::Sample) marker type plus the
//! [`Flow`](crate::flow::Flow) it builds. Their binaries live in `src/bin/`.

pub mod image_viewer;
pub mod triangle;
pub mod wireframe;

pub use image_viewer::ImageViewer;
pub use triangle::Triangle;
pub use wireframe::Wireframe;
