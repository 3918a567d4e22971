//! Render pipeline descriptions.
//!
//! A [`RenderPipelineDesc`] names everything a context needs to build a
//! pipeline: shader stages, vertex layout, attachments and fixed-function
//! state. The same description is consumed by the wgpu context (see
//! [`basic::mk_render_pipeline`]) and by the headless context, which only
//! validates and records it.
//!
//! - `basic` turns a description into a `wgpu::RenderPipeline`

use crate::data_structures::handle::ShaderModuleHandle;

pub mod basic;

/// One shader stage: module plus entry point.
#[derive(Clone, Copy, Debug)]
pub struct ShaderStage<'a> {
    pub module: ShaderModuleHandle,
    pub entry_point: &'a str,
}

/// Per-vertex input of a single vertex buffer bound at slot 0.
#[derive(Clone, Debug)]
pub struct VertexInput {
    pub stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

#[derive(Clone, Copy, Debug)]
pub struct ColorTarget {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

#[derive(Clone, Copy, Debug)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub compare: wgpu::CompareFunction,
    pub write: bool,
}

#[derive(Clone, Debug)]
pub struct RenderPipelineDesc<'a> {
    pub name: &'a str,
    pub vertex: ShaderStage<'a>,
    pub fragment: ShaderStage<'a>,
    /// `None` for pipelines that generate their vertices in the shader.
    pub vertex_input: Option<VertexInput>,
    pub color_targets: Vec<ColorTarget>,
    pub depth: Option<DepthState>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    pub depth_bias: wgpu::DepthBiasState,
    /// Values for `override` constants declared in the fragment stage.
    pub spec_constants: Vec<(&'a str, f64)>,
    /// Size in bytes of the push constant block visible to both stages.
    pub push_constant_size: u32,
    /// Number of sampled texture bind groups (`@group(0)`, `@group(1)`, ...).
    pub texture_groups: u32,
}

impl<'a> RenderPipelineDesc<'a> {
    /// Triangle list, no culling, fill mode, `vs_main`/`fs_main` entry points
    /// and no attachments besides what gets added through the builder calls.
    pub fn new(name: &'a str, vert: ShaderModuleHandle, frag: ShaderModuleHandle) -> Self {
        Self {
            name,
            vertex: ShaderStage {
                module: vert,
                entry_point: "vs_main",
            },
            fragment: ShaderStage {
                module: frag,
                entry_point: "fs_main",
            },
            vertex_input: None,
            color_targets: Vec::new(),
            depth: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            depth_bias: wgpu::DepthBiasState::default(),
            spec_constants: Vec::new(),
            push_constant_size: 0,
            texture_groups: 0,
        }
    }

    pub fn entry_points(mut self, vertex: &'a str, fragment: &'a str) -> Self {
        self.vertex.entry_point = vertex;
        self.fragment.entry_point = fragment;
        self
    }

    pub fn vertex_input(mut self, stride: u64, attributes: Vec<wgpu::VertexAttribute>) -> Self {
        self.vertex_input = Some(VertexInput { stride, attributes });
        self
    }

    pub fn color(mut self, format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>) -> Self {
        self.color_targets.push(ColorTarget { format, blend });
        self
    }

    /// Depth test with `Less` and depth writes enabled.
    pub fn depth(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth = Some(DepthState {
            format,
            compare: wgpu::CompareFunction::Less,
            write: true,
        });
        self
    }

    pub fn topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn polygon_mode(mut self, polygon_mode: wgpu::PolygonMode) -> Self {
        self.polygon_mode = polygon_mode;
        self
    }

    pub fn depth_bias(mut self, depth_bias: wgpu::DepthBiasState) -> Self {
        self.depth_bias = depth_bias;
        self
    }

    pub fn spec_constant(mut self, name: &'a str, value: f64) -> Self {
        self.spec_constants.push((name, value));
        self
    }

    pub fn push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    pub fn texture_groups(mut self, count: u32) -> Self {
        self.texture_groups = count;
        self
    }

    /// Device features this pipeline cannot be built without.
    pub fn required_features(&self) -> wgpu::Features {
        let mut features = wgpu::Features::empty();
        if self.push_constant_size > 0 {
            features |= wgpu::Features::PUSH_CONSTANTS;
        }
        if self.polygon_mode == wgpu::PolygonMode::Line {
            features |= wgpu::Features::POLYGON_MODE_LINE;
        }
        if self.polygon_mode == wgpu::PolygonMode::Point {
            features |= wgpu::Features::POLYGON_MODE_POINT;
        }
        features
    }

    /// Checks that do not need a device.
    pub fn validate(&self, features: wgpu::Features, max_push_constant_size: u32) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.vertex.module.is_null() && !self.fragment.module.is_null(),
            "pipeline '{}' references a null shader module",
            self.name
        );
        anyhow::ensure!(
            !self.color_targets.is_empty() || self.depth.is_some(),
            "pipeline '{}' has no attachments",
            self.name
        );
        let required = self.required_features();
        anyhow::ensure!(
            features.contains(required),
            "pipeline '{}' needs device features {required:?}, the device offers {features:?}",
            self.name
        );
        anyhow::ensure!(
            self.push_constant_size % 4 == 0 && self.push_constant_size <= max_push_constant_size,
            "pipeline '{}': push constant block of {} bytes (limit {max_push_constant_size}, must be a multiple of 4)",
            self.name,
            self.push_constant_size
        );
        Ok(())
    }
}
