//! An image shown on a letterboxed quad, with a UI overlay on top.
//!
//! The quad's push constant block carries the image's texture index; index 0
//! (the white texture) would draw the quad untextured. The overlay shows an
//! image viewer window using the same texture and a small demo window whose
//! "untextured quad" checkbox switches the quad to index 0.

use anyhow::Result;

use crate::{
    config::AppConfig,
    context::RenderContext,
    data_structures::{
        desc::{ShaderModuleDesc, TextureDesc, TextureSize},
        handle::{RenderPipelineKind, ShaderModuleKind, TextureKind},
        holder::Holder,
        texture::PixelBuffer,
        transform::{PushConstants, aspect_ratio, ortho_mvp},
    },
    flow::{Flow, FrameInfo, Sample},
    input::InputState,
    pipelines::RenderPipelineDesc,
    render::{CommandBuffer, Framebuffer, RenderPass},
    resources::AssetLoader,
    ui::UiOverlay,
};

pub const VERTEX_SHADER: &str = "shaders/quad.vert.wgsl";
pub const FRAGMENT_SHADER: &str = "shaders/quad.frag.wgsl";

/// Vertices of the two quad triangles, generated in the vertex shader.
pub const QUAD_VERTICES: u32 = 6;

pub const CLEAR_COLOUR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.05,
    b: 0.05,
    a: 1.0,
};

pub struct ImageViewer;

pub struct ImageViewerAssets {
    pub image: PixelBuffer,
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub font: Option<Vec<u8>>,
}

struct DemoState {
    show_viewer: bool,
    zoom: f32,
    tint_quad: bool,
    /// Where the "untextured quad" checkbox was laid out last frame, in points.
    toggle_rect: Option<egui::Rect>,
}

pub struct ImageViewerFlow<'c> {
    ui: UiOverlay<'c>,
    pipeline: Holder<'c, RenderPipelineKind>,
    image: Holder<'c, TextureKind>,
    _fragment: Holder<'c, ShaderModuleKind>,
    _vertex: Holder<'c, ShaderModuleKind>,
    image_id: egui::TextureId,
    image_size: (u32, u32),
    demo: DemoState,
}

impl Sample for ImageViewer {
    type Assets = ImageViewerAssets;

    async fn load(loader: &AssetLoader, config: &AppConfig) -> Result<ImageViewerAssets> {
        let font = async {
            match &config.font_file {
                Some(font) => loader.load_font(font).await.map(Some),
                None => Ok(None),
            }
        };
        let (image, vertex_shader, fragment_shader, font) = futures::try_join!(
            loader.load_image(&config.image_file),
            loader.load_shader(VERTEX_SHADER),
            loader.load_shader(FRAGMENT_SHADER),
            font
        )?;
        Ok(ImageViewerAssets {
            image,
            vertex_shader,
            fragment_shader,
            font,
        })
    }

    fn build<'c>(
        ctx: &'c dyn RenderContext,
        assets: ImageViewerAssets,
    ) -> Result<Box<dyn Flow + 'c>> {
        Ok(Box::new(Self::build_flow(ctx, assets)?))
    }
}

impl ImageViewer {
    /// Same as [`Sample::build`], without boxing the flow.
    pub fn build_flow<'c>(
        ctx: &'c dyn RenderContext,
        assets: ImageViewerAssets,
    ) -> Result<ImageViewerFlow<'c>> {
        let vertex = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.vertex_shader,
            "quad vertex shader",
        ))?;
        let fragment = ctx.create_shader_module(ShaderModuleDesc::new(
            &assets.fragment_shader,
            "quad fragment shader",
        ))?;

        let ImageViewerAssets {
            image: pixels,
            font,
            ..
        } = assets;
        let image = ctx.create_texture(TextureDesc {
            format: PixelBuffer::FORMAT,
            size: TextureSize::Fixed {
                width: pixels.width,
                height: pixels.height,
            },
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            data: Some(&pixels.pixels),
            debug_name: "image",
        })?;
        let image_size = (pixels.width, pixels.height);
        drop(pixels);

        let pipeline = ctx.create_render_pipeline(
            &RenderPipelineDesc::new("textured quad", vertex.handle(), fragment.handle())
                .color(ctx.swapchain_format(), None)
                .push_constants(PushConstants::SIZE)
                .texture_groups(1),
        )?;

        let mut ui = UiOverlay::new(ctx, font)?;
        let image_id = ui.register_texture(image.handle())?;

        anyhow::ensure!(
            vertex.is_valid() && fragment.is_valid() && image.is_valid() && pipeline.is_valid(),
            "image viewer resources are invalid"
        );
        log::info!(
            "image viewer ready: {}x{} image at texture index {}",
            image_size.0,
            image_size.1,
            image.index()
        );

        Ok(ImageViewerFlow {
            ui,
            pipeline,
            image,
            _fragment: fragment,
            _vertex: vertex,
            image_id,
            image_size,
            demo: DemoState {
                show_viewer: true,
                zoom: 0.5,
                tint_quad: false,
                toggle_rect: None,
            },
        })
    }
}

impl<'c> ImageViewerFlow<'c> {
    pub fn ui(&self) -> &UiOverlay<'c> {
        &self.ui
    }

    /// Screen rectangle of the "untextured quad" checkbox, in points, once
    /// the demo window has been shown.
    pub fn untextured_toggle(&self) -> Option<egui::Rect> {
        self.demo.toggle_rect
    }

    fn declare_ui(&mut self, frame: &FrameInfo) {
        let egui_ctx = self.ui.context().clone();
        let demo = &mut self.demo;
        let (width, height) = self.image_size;
        let image_id = self.image_id;

        egui::Window::new("Image viewer")
            .open(&mut demo.show_viewer)
            .default_pos(egui::pos2(320.0, 16.0))
            .show(&egui_ctx, |ui| {
                ui.label(format!("{width} x {height} pixels"));
                let size = egui::vec2(width as f32, height as f32) * demo.zoom;
                ui.add(egui::Image::new(egui::load::SizedTexture::new(image_id, size)));
            });

        egui::Window::new("Demo")
            .default_pos(egui::pos2(16.0, 16.0))
            .show(&egui_ctx, |ui| {
                ui.label(format!("frame {}", frame.index));
                ui.label(format!("{:.1} s", frame.time));
                ui.add(egui::Slider::new(&mut demo.zoom, 0.1..=4.0).text("zoom"));
                let toggle = ui.checkbox(&mut demo.tint_quad, "untextured quad");
                demo.toggle_rect = Some(toggle.rect);
                if ui.button("reset").clicked() {
                    demo.zoom = 0.5;
                    demo.tint_quad = false;
                }
            });
    }
}

impl Flow for ImageViewerFlow<'_> {
    fn on_render(
        &mut self,
        ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        frame: &FrameInfo,
        input: &InputState,
    ) -> Result<()> {
        let image_aspect = self.image_size.0 as f32 / self.image_size.1.max(1) as f32;
        let texture_id = if self.demo.tint_quad {
            0
        } else {
            self.image.index()
        };
        let constants = PushConstants::new(
            ortho_mvp(aspect_ratio(frame.framebuffer), image_aspect),
            texture_id,
        );

        self.ui
            .begin_frame(input, frame.framebuffer, frame.pixels_per_point, frame.time);
        self.declare_ui(frame);

        let framebuffer = Framebuffer::color(ctx.current_swapchain_texture());
        cmd.begin_rendering(&RenderPass::clear(CLEAR_COLOUR), &framebuffer);
        cmd.push_debug_group("Render Image");
        cmd.bind_render_pipeline(self.pipeline.handle());
        cmd.bind_texture(0, self.image.handle());
        cmd.push_constants(&constants);
        cmd.draw(QUAD_VERTICES, 1);
        cmd.pop_debug_group();
        self.ui.end_frame(cmd, frame.framebuffer);
        cmd.end_rendering();
        Ok(())
    }
}
