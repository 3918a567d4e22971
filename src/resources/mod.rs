//! Loading shaders, meshes, images and fonts from the asset directory.
//!
//! All file access goes through [`AssetLoader`], which resolves names against
//! one root directory and reads asynchronously with `tokio::fs`. Decoding is
//! delegated to [`mesh`] (tobj, gltf) and [`texture`] (image).
//!
//! A missing or corrupt file is an error naming the path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data_structures::{mesh::MeshData, texture::PixelBuffer};

pub mod mesh;
pub mod texture;

#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `file_name` onto the root; absolute names are used as they are.
    pub fn resolve(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.root.join(file_name)
    }

    pub async fn load_string(&self, file_name: impl AsRef<Path>) -> Result<String> {
        let path = self.resolve(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }

    pub async fn load_binary(&self, file_name: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = self.resolve(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }

    /// WGSL source text.
    pub async fn load_shader(&self, file_name: impl AsRef<Path>) -> Result<String> {
        let file_name = file_name.as_ref();
        let source = self.load_string(file_name).await?;
        anyhow::ensure!(
            !source.trim().is_empty(),
            "shader {} is empty",
            self.resolve(file_name).display()
        );
        log::debug!("loaded shader {}", file_name.display());
        Ok(source)
    }

    /// First sub-mesh of an OBJ or glTF scene, triangulated.
    pub async fn load_mesh(&self, file_name: impl AsRef<Path>) -> Result<MeshData> {
        let file_name = file_name.as_ref();
        let extension = file_name
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let bytes = self.load_binary(file_name).await?;
        let mesh = match extension.as_deref() {
            Some("obj") => mesh::parse_obj(&bytes).await,
            Some("gltf") | Some("glb") => {
                let base = file_name.parent().unwrap_or(Path::new(""));
                mesh::parse_gltf(&bytes, |uri| self.load_binary(base.join(uri))).await
            }
            _ => Err(anyhow::anyhow!("unsupported mesh format")),
        }
        .with_context(|| format!("failed to import {}", self.resolve(file_name).display()))?;
        log::info!(
            "loaded mesh {}: {} vertices, {} triangles",
            file_name.display(),
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Image decoded to RGBA8.
    pub async fn load_image(&self, file_name: impl AsRef<Path>) -> Result<PixelBuffer> {
        let file_name = file_name.as_ref();
        let bytes = self.load_binary(file_name).await?;
        let image = texture::decode_image(&bytes)
            .with_context(|| format!("failed to decode {}", self.resolve(file_name).display()))?;
        log::info!(
            "loaded image {}: {}x{}",
            file_name.display(),
            image.width,
            image.height
        );
        Ok(image)
    }

    /// Raw font file bytes for the UI.
    pub async fn load_font(&self, file_name: impl AsRef<Path>) -> Result<Vec<u8>> {
        let file_name = file_name.as_ref();
        let bytes = self.load_binary(file_name).await?;
        anyhow::ensure!(
            bytes.len() > 4,
            "font {} is truncated",
            self.resolve(file_name).display()
        );
        Ok(bytes)
    }
}
