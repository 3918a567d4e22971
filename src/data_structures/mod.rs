//! Core data types shared by the contexts and the programs.
//!
//! - `handle` holds typed generational handles and the pool that issues them
//! - `holder` is the scope guard destroying a resource when dropped
//! - `desc` contains creation descriptors for buffers, textures and shaders
//! - `mesh` is imported geometry on its way to the GPU
//! - `texture` contains decoded pixels and the GPU texture wrapper
//! - `transform` holds per-frame matrices and the push constant block

pub mod desc;
pub mod handle;
pub mod holder;
pub mod mesh;
pub mod texture;
pub mod transform;
