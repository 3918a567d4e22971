//! An imported mesh drawn twice per frame: filled, then as a wireframe pulled
//! slightly towards the camera with a depth bias.
//!
//! Both pipelines share the shader modules. The fragment shader's
//! `is_wireframe` override switches the colour.

use anyhow::Result;

use crate::{
    config::AppConfig,
    context::RenderContext,
    data_structures::{
        desc::{BufferDesc, ShaderModuleDesc, TextureDesc, TextureSize},
        handle::{
            BufferKind, RenderPipelineKind, ShaderModuleHandle, ShaderModuleKind, TextureKind,
        },
        holder::Holder,
        mesh::MeshData,
        texture::Texture,
        transform::{PushConstants, aspect_ratio, spinning_mvp},
    },
    flow::{Flow, FrameInfo, Sample},
    input::InputState,
    pipelines::RenderPipelineDesc,
    render::{CommandBuffer, Framebuffer, RenderPass},
    resources::AssetLoader,
};

pub const VERTEX_SHADER: &str = "shaders/mesh.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "shaders/mesh.frag.wgsl";
pub const WIREFRAME_CONSTANT: &str = "is_wireframe";

pub const CLEAR_COLOUR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.12,
    a: 1.0,
};

/// Pulls lines in front of the filled faces they outline.
pub const WIREFRAME_DEPTH_BIAS: wgpu::DepthBiasState = wgpu::DepthBiasState {
    constant: 0,
    slope_scale: -1.0,
    clamp: 0.0,
};

pub struct Wireframe;

pub struct WireframeAssets {
    pub mesh: MeshData,
    pub vertex_shader: String,
    pub fragment_shader: String,
}

pub struct WireframeFlow<'c> {
    wire_pipeline: Holder<'c, RenderPipelineKind>,
    solid_pipeline: Holder<'c, RenderPipelineKind>,
    depth: Holder<'c, TextureKind>,
    index_buffer: Holder<'c, BufferKind>,
    vertex_buffer: Holder<'c, BufferKind>,
    _fragment: Holder<'c, ShaderModuleKind>,
    _vertex: Holder<'c, ShaderModuleKind>,
    index_count: u32,
}

/// Pipeline pair for one shader pair. Only polygon mode, depth bias and the
/// wireframe constant differ.
pub fn mesh_pipeline_descs<'a>(
    vertex: ShaderModuleHandle,
    fragment: ShaderModuleHandle,
    color_format: wgpu::TextureFormat,
) -> (RenderPipelineDesc<'a>, RenderPipelineDesc<'a>) {
    let base = RenderPipelineDesc::new("mesh solid", vertex, fragment)
        .vertex_input(MeshData::VERTEX_STRIDE, MeshData::vertex_attributes())
        .color(color_format, None)
        .depth(Texture::DEPTH_FORMAT)
        .push_constants(PushConstants::SIZE);
    let solid = base.clone().spec_constant(WIREFRAME_CONSTANT, 0.0);
    let mut wire = base
        .polygon_mode(wgpu::PolygonMode::Line)
        .depth_bias(WIREFRAME_DEPTH_BIAS)
        .spec_constant(WIREFRAME_CONSTANT, 1.0);
    wire.name = "mesh wireframe";
    (solid, wire)
}

impl Sample for Wireframe {
    type Assets = WireframeAssets;

    async fn load(loader: &AssetLoader, config: &AppConfig) -> Result<WireframeAssets> {
        let (mesh, vertex_shader, fragment_shader) = futures::try_join!(
            loader.load_mesh(&config.mesh_file),
            loader.load_shader(VERTEX_SHADER),
            loader.load_shader(FRAGMENT_SHADER)
        )?;
        Ok(WireframeAssets {
            mesh,
            vertex_shader,
            fragment_shader,
        })
    }

    fn build<'c>(ctx: &'c dyn RenderContext, assets: WireframeAssets) -> Result<Box<dyn Flow + 'c>> {
        let vertex = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.vertex_shader,
            "mesh vertex shader",
        ))?;
        let fragment = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.fragment_shader,
            "mesh fragment shader",
        ))?;

        let mesh = assets.mesh;
        let vertex_buffer = ctx.create_buffer(BufferDesc::with_data(
            wgpu::BufferUsages::VERTEX,
            mesh.vertex_bytes(),
            "mesh vertices",
        ))?;
        let index_buffer = ctx.create_buffer(BufferDesc::with_data(
            wgpu::BufferUsages::INDEX,
            mesh.index_bytes(),
            "mesh indices",
        ))?;
        let index_count = mesh.indices.len() as u32;
        drop(mesh);

        let depth = ctx.create_texture(TextureDesc {
            format: Texture::DEPTH_FORMAT,
            size: TextureSize::Framebuffer,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            data: None,
            debug_name: "depth",
        })?;

        let (solid_desc, wire_desc) =
            mesh_pipeline_descs(vertex.handle(), fragment.handle(), ctx.swapchain_format());
        let solid_pipeline = ctx.create_render_pipeline(&solid_desc)?;
        let wire_pipeline = ctx.create_render_pipeline(&wire_desc)?;

        anyhow::ensure!(
            vertex_buffer.is_valid()
                && index_buffer.is_valid()
                && depth.is_valid()
                && solid_pipeline.is_valid()
                && wire_pipeline.is_valid(),
            "wireframe resources are invalid"
        );
        log::info!("wireframe ready: {} triangles", index_count / 3);

        Ok(Box::new(WireframeFlow {
            wire_pipeline,
            solid_pipeline,
            depth,
            index_buffer,
            vertex_buffer,
            _fragment: fragment,
            _vertex: vertex,
            index_count,
        }))
    }
}

impl Flow for WireframeFlow<'_> {
    fn on_render(
        &mut self,
        ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        frame: &FrameInfo,
        _input: &InputState,
    ) -> Result<()> {
        let constants = PushConstants::new(
            spinning_mvp(aspect_ratio(frame.framebuffer), frame.time),
            0,
        );
        let framebuffer =
            Framebuffer::color(ctx.current_swapchain_texture()).with_depth(self.depth.handle());

        cmd.begin_rendering(&RenderPass::clear(CLEAR_COLOUR).with_depth_clear(1.0), &framebuffer);
        cmd.bind_vertex_buffer(0, self.vertex_buffer.handle());
        cmd.bind_index_buffer(self.index_buffer.handle(), wgpu::IndexFormat::Uint32);

        cmd.push_debug_group("Render Mesh");
        cmd.bind_render_pipeline(self.solid_pipeline.handle());
        cmd.push_constants(&constants);
        cmd.draw_indexed(self.index_count, 1, 0, 0);
        cmd.pop_debug_group();

        cmd.push_debug_group("Render Wireframe");
        cmd.bind_render_pipeline(self.wire_pipeline.handle());
        cmd.push_constants(&constants);
        cmd.draw_indexed(self.index_count, 1, 0, 0);
        cmd.pop_debug_group();

        cmd.end_rendering();
        Ok(())
    }
}
