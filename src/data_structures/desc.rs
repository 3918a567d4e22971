//! Creation descriptors for buffers, textures and shader modules.
//!
//! Pipelines have their own builder in [`crate::pipelines`].

/// Describes a GPU buffer.
///
/// When `data` is given the buffer is filled at creation time. A `size` of `0`
/// means "exactly as large as `data`".
#[derive(Clone, Debug)]
pub struct BufferDesc<'a> {
    pub usage: wgpu::BufferUsages,
    pub size: u64,
    pub data: Option<&'a [u8]>,
    pub debug_name: &'a str,
}

impl<'a> BufferDesc<'a> {
    pub fn with_data(usage: wgpu::BufferUsages, data: &'a [u8], debug_name: &'a str) -> Self {
        Self {
            usage,
            size: data.len() as u64,
            data: Some(data),
            debug_name,
        }
    }

    pub fn empty(usage: wgpu::BufferUsages, size: u64, debug_name: &'a str) -> Self {
        Self {
            usage,
            size,
            data: None,
            debug_name,
        }
    }

    /// Final byte size after applying the "size 0 means data length" rule.
    pub fn resolved_size(&self) -> u64 {
        match (self.size, self.data) {
            (0, Some(data)) => data.len() as u64,
            (size, _) => size,
        }
    }

    pub fn validate(&self) -> anyhow::Result<u64> {
        let size = self.resolved_size();
        anyhow::ensure!(size > 0, "buffer '{}' has zero size", self.debug_name);
        if let Some(data) = self.data {
            anyhow::ensure!(
                data.len() as u64 <= size,
                "buffer '{}': {} bytes of initial data exceed its size of {size}",
                self.debug_name,
                data.len()
            );
        }
        Ok(size)
    }
}

/// Extent of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSize {
    Fixed { width: u32, height: u32 },
    /// Tracks the swapchain; the context recreates it on every resize.
    Framebuffer,
}

/// Describes a 2D texture.
#[derive(Clone, Debug)]
pub struct TextureDesc<'a> {
    pub format: wgpu::TextureFormat,
    pub size: TextureSize,
    pub usage: wgpu::TextureUsages,
    /// Tightly packed texel rows for the whole texture.
    pub data: Option<&'a [u8]>,
    pub debug_name: &'a str,
}

impl<'a> TextureDesc<'a> {
    pub fn extent(&self, framebuffer: (u32, u32)) -> (u32, u32) {
        match self.size {
            TextureSize::Fixed { width, height } => (width, height),
            TextureSize::Framebuffer => (framebuffer.0.max(1), framebuffer.1.max(1)),
        }
    }

    pub fn validate(&self, framebuffer: (u32, u32)) -> anyhow::Result<(u32, u32)> {
        let (width, height) = self.extent(framebuffer);
        anyhow::ensure!(
            width > 0 && height > 0,
            "texture '{}' has an empty extent {width}x{height}",
            self.debug_name
        );
        if let Some(data) = self.data {
            anyhow::ensure!(
                matches!(self.size, TextureSize::Fixed { .. }),
                "texture '{}': framebuffer-sized textures cannot take initial data",
                self.debug_name
            );
            let texel = self.format.block_copy_size(None).unwrap_or(4) as usize;
            let expected = width as usize * height as usize * texel;
            anyhow::ensure!(
                data.len() == expected,
                "texture '{}': expected {expected} bytes of texel data, got {}",
                self.debug_name,
                data.len()
            );
        }
        Ok((width, height))
    }
}

/// WGSL shader source and a debug name.
#[derive(Clone, Copy, Debug)]
pub struct ShaderModuleDesc<'a> {
    pub source: &'a str,
    pub debug_name: &'a str,
}

impl<'a> ShaderModuleDesc<'a> {
    pub fn new(source: &'a str, debug_name: &'a str) -> Self {
        Self { source, debug_name }
    }
}
