//! A single triangle generated in the vertex shader, on a white background.

use anyhow::Result;

use crate::{
    config::AppConfig,
    context::RenderContext,
    data_structures::{
        desc::ShaderModuleDesc,
        handle::{RenderPipelineKind, ShaderModuleKind},
        holder::Holder,
    },
    flow::{Flow, FrameInfo, Sample},
    input::InputState,
    pipelines::RenderPipelineDesc,
    render::{CommandBuffer, Framebuffer, RenderPass},
    resources::AssetLoader,
};

pub const VERTEX_SHADER: &str = "shaders/triangle.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "shaders/triangle.frag.wgsl";

pub struct Triangle;

pub struct TriangleAssets {
    pub vertex_shader: String,
    pub fragment_shader: String,
}

pub struct TriangleFlow<'c> {
    pipeline: Holder<'c, RenderPipelineKind>,
    _fragment: Holder<'c, ShaderModuleKind>,
    _vertex: Holder<'c, ShaderModuleKind>,
}

impl Sample for Triangle {
    type Assets = TriangleAssets;

    async fn load(loader: &AssetLoader, _config: &AppConfig) -> Result<TriangleAssets> {
        let (vertex_shader, fragment_shader) = futures::try_join!(
            loader.load_shader(VERTEX_SHADER),
            loader.load_shader(FRAGMENT_SHADER)
        )?;
        Ok(TriangleAssets {
            vertex_shader,
            fragment_shader,
        })
    }

    fn build<'c>(ctx: &'c dyn RenderContext, assets: TriangleAssets) -> Result<Box<dyn Flow + 'c>> {
        let vertex = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.vertex_shader,
            "triangle vertex shader",
        ))?;
        let fragment = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.fragment_shader,
            "triangle fragment shader",
        ))?;
        let pipeline = ctx.create_render_pipeline(
            &RenderPipelineDesc::new("triangle", vertex.handle(), fragment.handle())
                .color(ctx.swapchain_format(), None),
        )?;
        anyhow::ensure!(
            vertex.is_valid() && fragment.is_valid() && pipeline.is_valid(),
            "triangle resources are invalid"
        );
        Ok(Box::new(TriangleFlow {
            pipeline,
            _fragment: fragment,
            _vertex: vertex,
        }))
    }
}

impl Flow for TriangleFlow<'_> {
    fn on_render(
        &mut self,
        ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        _frame: &FrameInfo,
        _input: &InputState,
    ) -> Result<()> {
        let framebuffer = Framebuffer::color(ctx.current_swapchain_texture());
        cmd.begin_rendering(&RenderPass::clear(wgpu::Color::WHITE), &framebuffer);
        cmd.bind_render_pipeline(self.pipeline.handle());
        cmd.push_debug_group("Render Triangle");
        cmd.draw(3, 1);
        cmd.pop_debug_group();
        cmd.end_rendering();
        Ok(())
    }
}
