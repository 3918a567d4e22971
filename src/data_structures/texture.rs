//! CPU pixel data and GPU textures.
//!
//! [`PixelBuffer`] is what the asset loader produces: decoded, tightly packed
//! RGBA8 texels. [`Texture`] is the GPU side the wgpu context keeps per
//! texture handle: the texture itself, a default view and, for sampled
//! textures, a bind group matching [`sampled_texture_layout`].

use crate::data_structures::desc::TextureDesc;

/// Decoded RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    pub fn from_image(img: image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        }
    }
}

/// A GPU texture with its default view and an optional sampling bind group.
#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: Option<wgpu::BindGroup>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Creates a texture from `desc` and uploads its initial data, if any.
    ///
    /// # Arguments
    ///
    /// * `extent` is the already resolved [width, height] in texels
    /// * `sampled` provides the layout and sampler for the bind group; it is
    ///   ignored for depth formats, which are not float-filterable
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &TextureDesc<'_>,
        extent: (u32, u32),
        sampled: Option<(&wgpu::BindGroupLayout, &wgpu::Sampler)>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: extent.0,
            height: extent.1,
            depth_or_array_layers: 1,
        };
        let mut usage = desc.usage;
        if desc.data.is_some() || usage.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            usage |= wgpu::TextureUsages::COPY_DST;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.debug_name),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });

        if let Some(data) = desc.data {
            write_texels(queue, &texture, desc.format, [0, 0], [extent.0, extent.1], data);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = sampled
            .filter(|_| {
                desc.usage.contains(wgpu::TextureUsages::TEXTURE_BINDING)
                    && !desc.format.is_depth_stencil_format()
            })
            .map(|(layout, sampler)| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(desc.debug_name),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                })
            });

        Self {
            texture,
            view,
            bind_group,
        }
    }
}

/// Uploads a tightly packed sub-rectangle of texels.
pub fn write_texels(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    format: wgpu::TextureFormat,
    origin: [u32; 2],
    size: [u32; 2],
    data: &[u8],
) {
    let texel = format.block_copy_size(None).unwrap_or(4);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: origin[0],
                y: origin[1],
                z: 0,
            },
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(texel * size[0]),
            rows_per_image: Some(size[1]),
        },
        wgpu::Extent3d {
            width: size[0],
            height: size[1],
            depth_or_array_layers: 1,
        },
    );
}

fn fragment_entry(binding: u32, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    }
}

/// Layout of every sampled texture bind group: the view at binding 0 and a
/// filtering sampler at binding 1.
pub fn sampled_texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let view = wgpu::BindingType::Texture {
        multisampled: false,
        view_dimension: wgpu::TextureViewDimension::D2,
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
    };
    let sampler = wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering);
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("sampled texture layout"),
        entries: &[fragment_entry(0, view), fragment_entry(1, sampler)],
    })
}

/// Bilinear, clamped. Shared by every sampled texture, the UI's included.
pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("default sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
