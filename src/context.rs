//! The rendering context: resource creation and command submission.
//!
//! [`RenderContext`] is the seam every program talks to. It hands out typed
//! handles wrapped in [`Holder`]s, records nothing by itself and replays a
//! [`CommandBuffer`] on [`submit`](RenderContext::submit). Two implementations
//! exist:
//!
//! - [`Context`] drives a real GPU through wgpu and presents to a winit window
//! - [`HeadlessContext`](crate::headless::HeadlessContext) validates and
//!   records everything without a device
//!
//! Texture slot 0 is always a 1x1 white texture and slot 1 is the swapchain
//! image, so a texture index of `0` in a push constant block means "untextured".
//!
//! The UI is painted by an `egui_wgpu::Renderer` owned by [`Context`]; it is
//! created on first use for the swapchain format and keeps egui's textures.

use std::{
    cell::{Cell, RefCell, RefMut},
    sync::Arc,
};

use anyhow::{Context as _, Result, anyhow, bail};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    data_structures::{
        desc::{BufferDesc, ShaderModuleDesc, TextureDesc, TextureSize},
        handle::{
            AnyHandle, BufferHandle, BufferKind, Pool, RenderPipelineKind, ShaderModuleKind, TextureHandle,
            TextureKind,
        },
        holder::Holder,
        texture::{self, Texture},
    },
    pipelines::{
        RenderPipelineDesc,
        basic::{mk_pipeline_layout, mk_render_pipeline},
    },
    render::{self, Command, CommandBuffer, Framebuffer, LoadOp, RenderPass, UiPaint, UiScreen},
};

pub const WHITE_TEXTURE_INDEX: u32 = 0;
pub const SWAPCHAIN_TEXTURE_INDEX: u32 = 1;

/// Resource creation and submission, shared by the GPU and the headless
/// implementation.
///
/// All methods take `&self`; implementations use interior mutability. Created
/// resources come back as [`Holder`]s borrowing the context, which makes
/// "destroyed before the context" a compile-time property.
pub trait RenderContext {
    fn swapchain_format(&self) -> wgpu::TextureFormat;

    /// Current framebuffer extent as last passed to [`resize`](Self::resize).
    fn framebuffer_size(&self) -> (u32, u32);

    /// Optional device features that were actually enabled.
    fn features(&self) -> wgpu::Features;

    fn create_buffer(&self, desc: BufferDesc<'_>) -> Result<Holder<'_, BufferKind>>;

    fn create_texture(&self, desc: TextureDesc<'_>) -> Result<Holder<'_, TextureKind>>;

    fn create_shader_module(
        &self,
        desc: ShaderModuleDesc<'_>,
    ) -> Result<Holder<'_, ShaderModuleKind>>;

    fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<Holder<'_, RenderPipelineKind>>;

    /// Releases a resource. Stale and reserved handles are ignored with a warning.
    fn destroy(&self, handle: AnyHandle);

    fn acquire_command_buffer(&self) -> CommandBuffer;

    fn current_swapchain_texture(&self) -> TextureHandle;

    /// Reconfigures the swapchain and every framebuffer-sized texture.
    fn resize(&self, width: u32, height: u32);

    /// Makes a sampleable texture drawable by the UI.
    fn register_ui_texture(&self, texture: TextureHandle) -> Result<egui::TextureId>;

    fn unregister_ui_texture(&self, id: egui::TextureId);

    /// Validates and executes `cmd`, then presents when `present` names the
    /// swapchain image.
    ///
    /// UI texture changes in `cmd` are applied even when the frame itself is
    /// skipped.
    fn submit(&self, cmd: CommandBuffer, present: Option<TextureHandle>) -> Result<()>;
}

/// GPU setup knobs.
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub prefer_srgb: bool,
    pub present_mode: wgpu::PresentMode,
    pub desired_maximum_frame_latency: u32,
    /// Requested when the adapter offers them.
    pub optional_features: Vec<wgpu::Features>,
    pub max_push_constant_size: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            optional_features: vec![
                wgpu::Features::PUSH_CONSTANTS,
                wgpu::Features::POLYGON_MODE_LINE,
            ],
            max_push_constant_size: 128,
        }
    }
}

pub(crate) fn stale(handle: AnyHandle) -> anyhow::Error {
    anyhow!("{} handle {handle:?} is null or was destroyed", handle.kind_name())
}

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }
    if prefer_srgb {
        if let Some(format) = caps.formats.iter().copied().find(|f| f.is_srgb()) {
            return Some(format);
        }
    }
    Some(caps.formats[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SurfaceErrorAction {
    Reconfigured,
    SkipFrame,
    Fatal,
}

pub(crate) fn map_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    err: &wgpu::SurfaceError,
) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            surface.configure(device, config);
            SurfaceErrorAction::Reconfigured
        }
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    name: String,
}

struct GpuTexture {
    texture: Texture,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    size: TextureSize,
    name: String,
}

enum TextureSlot {
    Gpu(GpuTexture),
    Swapchain,
}

struct GpuShader {
    module: wgpu::ShaderModule,
    name: String,
}

struct GpuPipeline {
    pipeline: wgpu::RenderPipeline,
    name: String,
}

#[derive(Default)]
struct Resources {
    buffers: Pool<BufferKind, GpuBuffer>,
    textures: Pool<TextureKind, TextureSlot>,
    shaders: Pool<ShaderModuleKind, GpuShader>,
    pipelines: Pool<RenderPipelineKind, GpuPipeline>,
}

impl Resources {
    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer> {
        self.buffers
            .get(handle)
            .ok_or_else(|| stale(AnyHandle::Buffer(handle)))
    }

    fn gpu_texture(&self, handle: TextureHandle) -> Result<&GpuTexture> {
        match self.textures.get(handle) {
            Some(TextureSlot::Gpu(texture)) => Ok(texture),
            Some(TextureSlot::Swapchain) => bail!("the swapchain image cannot be sampled or written"),
            None => Err(stale(AnyHandle::Texture(handle))),
        }
    }

    fn view<'a>(
        &'a self,
        handle: TextureHandle,
        swapchain: Option<&'a wgpu::TextureView>,
    ) -> Result<&'a wgpu::TextureView> {
        match self.textures.get(handle) {
            Some(TextureSlot::Gpu(texture)) => Ok(&texture.texture.view),
            Some(TextureSlot::Swapchain) => swapchain.context("swapchain image was not acquired"),
            None => Err(stale(AnyHandle::Texture(handle))),
        }
    }
}

/// wgpu-backed [`RenderContext`] presenting to a window.
pub struct Context {
    resources: RefCell<Resources>,
    white_texture: TextureHandle,
    swapchain_texture: TextureHandle,
    sampler: wgpu::Sampler,
    sampled_layout: wgpu::BindGroupLayout,
    size: Cell<(u32, u32)>,
    config: RefCell<wgpu::SurfaceConfiguration>,
    features: wgpu::Features,
    max_push_constant_size: u32,
    ui_renderer: RefCell<Option<egui_wgpu::Renderer>>,
    surface: wgpu::Surface<'static>,
    queue: wgpu::Queue,
    device: wgpu::Device,
    window: Arc<Window>,
}

impl Context {
    /// Creates instance, surface, adapter and device for `window`.
    ///
    /// Every failure here is fatal for the program and returned as an error.
    pub async fn new(window: Arc<Window>, config: &ContextConfig) -> Result<Self> {
        let size = window.inner_size();

        log::info!("wgpu setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter is compatible with the window surface")?;
        let info = adapter.get_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);

        let mut features = wgpu::Features::empty();
        for feature in &config.optional_features {
            if adapter.features().contains(*feature) {
                features |= *feature;
            } else {
                log::warn!("adapter does not support {feature:?}");
            }
        }
        let mut required_limits = wgpu::Limits::default();
        let max_push_constant_size = if features.contains(wgpu::Features::PUSH_CONSTANTS) {
            config
                .max_push_constant_size
                .min(adapter.limits().max_push_constant_size)
        } else {
            0
        };
        required_limits.max_push_constant_size = max_push_constant_size;

        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("hello-ngin device"),
                required_features: features,
                required_limits,
                ..Default::default()
            })
            .await
            .context("failed to open the GPU device")?;
        let on_error: Box<dyn wgpu::UncapturedErrorHandler> = Box::new(|err| {
            log::error!("uncaptured wgpu error: {err}");
        });
        device.on_uncaptured_error(on_error.into());

        log::info!("surface");
        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, config.prefer_srgb)
            .context("the surface reports no supported formats")?;
        let present_mode = if caps.present_modes.contains(&config.present_mode) {
            config.present_mode
        } else {
            wgpu::PresentMode::Fifo
        };
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: config.desired_maximum_frame_latency,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&device, &surface_config);
        }

        let sampled_layout = texture::sampled_texture_layout(&device);
        let sampler = texture::create_default_sampler(&device);

        let mut resources = Resources::default();
        let white = Texture::create(
            &device,
            &queue,
            &white_desc(),
            (1, 1),
            Some((&sampled_layout, &sampler)),
        );
        let white_texture = resources.textures.insert(TextureSlot::Gpu(GpuTexture {
            texture: white,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            size: TextureSize::Fixed {
                width: 1,
                height: 1,
            },
            name: "white".to_string(),
        }));
        let swapchain_texture = resources.textures.insert(TextureSlot::Swapchain);
        debug_assert_eq!(white_texture.index(), WHITE_TEXTURE_INDEX);
        debug_assert_eq!(swapchain_texture.index(), SWAPCHAIN_TEXTURE_INDEX);

        Ok(Self {
            resources: RefCell::new(resources),
            white_texture,
            swapchain_texture,
            sampler,
            sampled_layout,
            size: Cell::new((size.width, size.height)),
            config: RefCell::new(surface_config),
            features,
            max_push_constant_size,
            ui_renderer: RefCell::new(None),
            surface,
            queue,
            device,
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Runs `create` inside a validation error scope.
    fn validated<T>(&self, what: &str, create: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        match futures::executor::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(anyhow!("{what}: {err}")),
            None => Ok(value),
        }
    }

    fn is_reserved(&self, handle: TextureHandle) -> bool {
        handle == self.white_texture || handle == self.swapchain_texture
    }

    fn ui_renderer(&self) -> RefMut<'_, egui_wgpu::Renderer> {
        let format = self.config.borrow().format;
        RefMut::map(self.ui_renderer.borrow_mut(), |renderer| {
            renderer.get_or_insert_with(|| {
                log::debug!("creating the UI renderer for {format:?}");
                egui_wgpu::Renderer::new(
                    &self.device,
                    format,
                    egui_wgpu::RendererOptions {
                        msaa_samples: 1,
                        depth_stencil_format: None,
                        ..Default::default()
                    },
                )
            })
        })
    }

    /// Uploads new and patched UI textures.
    fn stage_ui_textures(&self, paint: &UiPaint) -> Result<()> {
        if paint.textures_delta.set.is_empty() {
            return Ok(());
        }
        let mut renderer = self.ui_renderer();
        self.validated("UI texture upload", || {
            for (id, delta) in &paint.textures_delta.set {
                renderer.update_texture(&self.device, &self.queue, *id, delta);
            }
        })
    }

    fn release_ui_textures(&self, paint: &UiPaint) {
        if paint.textures_delta.free.is_empty() {
            return;
        }
        let mut renderer = self.ui_renderer();
        for id in &paint.textures_delta.free {
            renderer.free_texture(id);
        }
    }

    fn replay(
        &self,
        res: &Resources,
        commands: &[Command],
        swapchain: Option<&wgpu::TextureView>,
    ) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        let paint = render::ui_paint(commands);
        let mut ui_renderer = paint.map(|_| self.ui_renderer());
        let ui_buffers = match (ui_renderer.as_deref_mut(), paint) {
            (Some(renderer), Some(paint)) => renderer.update_buffers(
                &self.device,
                &self.queue,
                &mut encoder,
                &paint.primitives,
                &screen_descriptor(&paint.screen),
            ),
            _ => Vec::new(),
        };

        let mut i = 0;
        while i < commands.len() {
            match &commands[i] {
                Command::BeginRendering { pass, framebuffer } => {
                    let end = commands[i..]
                        .iter()
                        .position(|c| matches!(c, Command::EndRendering))
                        .map(|offset| i + offset)
                        .context("render pass without end")?;
                    encode_pass(
                        &mut encoder,
                        res,
                        pass,
                        framebuffer,
                        &commands[i + 1..end],
                        swapchain,
                        ui_renderer.as_deref(),
                    )?;
                    i = end;
                }
                Command::PushDebugGroup(label) => encoder.push_debug_group(label),
                Command::PopDebugGroup => encoder.pop_debug_group(),
                _ => {}
            }
            i += 1;
        }
        self.queue
            .submit(ui_buffers.into_iter().chain(std::iter::once(encoder.finish())));
        Ok(())
    }

    /// Acquires the swapchain image when needed, replays and presents.
    ///
    /// Transient surface errors skip the frame and return `Ok`.
    fn present_commands(&self, commands: &[Command], present: Option<TextureHandle>) -> Result<()> {
        let swapchain = AnyHandle::Texture(self.swapchain_texture);
        let needs_swapchain = present.is_some()
            || commands
                .iter()
                .any(|c| c.referenced_handles().contains(&swapchain));

        let frame = if needs_swapchain {
            match self.surface.get_current_texture() {
                Ok(frame) => Some(frame),
                Err(err) => {
                    let config = self.config.borrow();
                    match map_surface_error(&self.surface, &self.device, &config, &err) {
                        SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                            log::warn!("skipping frame: {err}");
                            return Ok(());
                        }
                        SurfaceErrorAction::Fatal => bail!("surface error: {err}"),
                    }
                }
            }
        } else {
            None
        };
        let view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        {
            let res = self.resources.borrow();
            self.validated("command submission", || {
                self.replay(&res, commands, view.as_ref())
            })??;
        }

        if let Some(frame) = frame {
            let suboptimal = frame.suboptimal;
            if present.is_some() {
                self.window.pre_present_notify();
                frame.present();
            }
            if suboptimal {
                self.surface.configure(&self.device, &self.config.borrow());
            }
        }
        Ok(())
    }
}

fn screen_descriptor(screen: &UiScreen) -> egui_wgpu::ScreenDescriptor {
    egui_wgpu::ScreenDescriptor {
        size_in_pixels: screen.size_in_pixels,
        pixels_per_point: screen.pixels_per_point,
    }
}

fn white_desc() -> TextureDesc<'static> {
    TextureDesc {
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        size: TextureSize::Fixed {
            width: 1,
            height: 1,
        },
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        data: Some(&[255, 255, 255, 255]),
        debug_name: "white",
    }
}

fn encode_pass(
    encoder: &mut wgpu::CommandEncoder,
    res: &Resources,
    pass: &RenderPass,
    framebuffer: &Framebuffer,
    body: &[Command],
    swapchain: Option<&wgpu::TextureView>,
    ui_renderer: Option<&egui_wgpu::Renderer>,
) -> Result<()> {
    let color_views = framebuffer
        .color
        .iter()
        .map(|h| res.view(*h, swapchain))
        .collect::<Result<Vec<_>>>()?;
    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_views
        .into_iter()
        .zip(&pass.color)
        .map(|(view, ops)| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match ops.load {
                        LoadOp::Clear => wgpu::LoadOp::Clear(ops.clear_colour),
                        LoadOp::Load => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();
    let depth_view = framebuffer
        .depth
        .map(|h| res.view(h, swapchain))
        .transpose()?;
    let depth_stencil_attachment =
        depth_view
            .zip(pass.depth)
            .map(|(view, ops)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: match ops.load {
                        LoadOp::Clear => wgpu::LoadOp::Clear(ops.clear_depth),
                        LoadOp::Load => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            });

    let mut rpass = encoder
        .begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("render pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        })
        .forget_lifetime();

    for command in body {
        match command {
            Command::BindRenderPipeline(handle) => {
                let pipeline = res
                    .pipelines
                    .get(*handle)
                    .ok_or_else(|| stale(AnyHandle::RenderPipeline(*handle)))?;
                rpass.set_pipeline(&pipeline.pipeline);
            }
            Command::BindVertexBuffer { slot, buffer } => {
                rpass.set_vertex_buffer(*slot, res.buffer(*buffer)?.buffer.slice(..));
            }
            Command::BindIndexBuffer { buffer, format } => {
                rpass.set_index_buffer(res.buffer(*buffer)?.buffer.slice(..), *format);
            }
            Command::BindTexture { group, texture } => {
                let gpu = res.gpu_texture(*texture)?;
                let bind_group = gpu
                    .texture
                    .bind_group
                    .as_ref()
                    .with_context(|| format!("texture '{}' is not sampleable", gpu.name))?;
                rpass.set_bind_group(*group, bind_group, &[]);
            }
            Command::PushConstants(data) => {
                rpass.set_push_constants(wgpu::ShaderStages::VERTEX_FRAGMENT, 0, data);
            }
            Command::Draw {
                vertex_count,
                instance_count,
            } => rpass.draw(0..*vertex_count, 0..*instance_count),
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
            } => rpass.draw_indexed(
                *first_index..first_index + index_count,
                *vertex_offset,
                0..*instance_count,
            ),
            Command::PushDebugGroup(label) => rpass.push_debug_group(label),
            Command::PopDebugGroup => rpass.pop_debug_group(),
            Command::PaintUi(paint) => {
                let renderer = ui_renderer.context("UI paint without a UI renderer")?;
                renderer.render(&mut rpass, &paint.primitives, &screen_descriptor(&paint.screen));
            }
            Command::BeginRendering { .. } | Command::EndRendering => {}
        }
    }
    Ok(())
}

impl RenderContext for Context {
    fn swapchain_format(&self) -> wgpu::TextureFormat {
        self.config.borrow().format
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn features(&self) -> wgpu::Features {
        self.features
    }

    fn create_buffer(&self, desc: BufferDesc<'_>) -> Result<Holder<'_, BufferKind>> {
        let size = desc.validate()?;
        let usage = desc.usage | wgpu::BufferUsages::COPY_DST;
        let buffer = match desc.data {
            Some(data) if data.len() as u64 == size => self.validated(desc.debug_name, || {
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(desc.debug_name),
                        contents: data,
                        usage,
                    })
            })?,
            data => {
                if let Some(data) = data {
                    anyhow::ensure!(
                        data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0,
                        "buffer '{}': partial initial data must be 4-byte aligned",
                        desc.debug_name
                    );
                }
                self.validated(desc.debug_name, || {
                    let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(desc.debug_name),
                        size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                        usage,
                        mapped_at_creation: false,
                    });
                    if let Some(data) = data {
                        self.queue.write_buffer(&buffer, 0, data);
                    }
                    buffer
                })?
            }
        };
        log::debug!("created buffer '{}' ({size} bytes)", desc.debug_name);
        let handle = self.resources.borrow_mut().buffers.insert(GpuBuffer {
            buffer,
            name: desc.debug_name.to_string(),
        });
        Ok(Holder::new(self, handle))
    }

    fn create_texture(&self, desc: TextureDesc<'_>) -> Result<Holder<'_, TextureKind>> {
        let extent = desc.validate(self.size.get())?;
        let texture = self.validated(desc.debug_name, || {
            Texture::create(
                &self.device,
                &self.queue,
                &desc,
                extent,
                Some((&self.sampled_layout, &self.sampler)),
            )
        })?;
        log::debug!(
            "created texture '{}' {}x{} {:?}",
            desc.debug_name,
            extent.0,
            extent.1,
            desc.format
        );
        let handle = self
            .resources
            .borrow_mut()
            .textures
            .insert(TextureSlot::Gpu(GpuTexture {
                texture,
                format: desc.format,
                usage: desc.usage,
                size: desc.size,
                name: desc.debug_name.to_string(),
            }));
        Ok(Holder::new(self, handle))
    }

    fn create_shader_module(
        &self,
        desc: ShaderModuleDesc<'_>,
    ) -> Result<Holder<'_, ShaderModuleKind>> {
        anyhow::ensure!(
            !desc.source.trim().is_empty(),
            "shader '{}' has no source",
            desc.debug_name
        );
        let module = self.validated(desc.debug_name, || {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(desc.debug_name),
                    source: wgpu::ShaderSource::Wgsl(desc.source.into()),
                })
        })?;
        log::debug!("compiled shader '{}'", desc.debug_name);
        let handle = self.resources.borrow_mut().shaders.insert(GpuShader {
            module,
            name: desc.debug_name.to_string(),
        });
        Ok(Holder::new(self, handle))
    }

    fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<Holder<'_, RenderPipelineKind>> {
        desc.validate(self.features, self.max_push_constant_size)?;
        let pipeline = {
            let res = self.resources.borrow();
            let vert = res
                .shaders
                .get(desc.vertex.module)
                .ok_or_else(|| stale(AnyHandle::ShaderModule(desc.vertex.module)))?;
            let frag = res
                .shaders
                .get(desc.fragment.module)
                .ok_or_else(|| stale(AnyHandle::ShaderModule(desc.fragment.module)))?;
            log::debug!(
                "building pipeline '{}' from '{}' and '{}'",
                desc.name,
                vert.name,
                frag.name
            );
            self.validated(desc.name, || {
                let layout = mk_pipeline_layout(&self.device, desc, &self.sampled_layout);
                mk_render_pipeline(&self.device, &layout, desc, &vert.module, &frag.module)
            })?
        };
        let handle = self.resources.borrow_mut().pipelines.insert(GpuPipeline {
            pipeline,
            name: desc.name.to_string(),
        });
        Ok(Holder::new(self, handle))
    }

    fn destroy(&self, handle: AnyHandle) {
        let mut res = self.resources.borrow_mut();
        let name = match handle {
            AnyHandle::Buffer(h) => res.buffers.remove(h).map(|b| {
                b.buffer.destroy();
                b.name
            }),
            AnyHandle::Texture(h) if self.is_reserved(h) => {
                log::warn!("refusing to destroy reserved texture {h:?}");
                return;
            }
            AnyHandle::Texture(h) => res.textures.remove(h).and_then(|slot| match slot {
                TextureSlot::Gpu(t) => {
                    t.texture.texture.destroy();
                    Some(t.name)
                }
                TextureSlot::Swapchain => None,
            }),
            AnyHandle::ShaderModule(h) => res.shaders.remove(h).map(|s| s.name),
            AnyHandle::RenderPipeline(h) => res.pipelines.remove(h).map(|p| p.name),
        };
        match name {
            Some(name) => log::debug!("destroyed {} '{name}'", handle.kind_name()),
            None => log::warn!("destroy called with stale handle {handle:?}"),
        }
    }

    fn acquire_command_buffer(&self) -> CommandBuffer {
        CommandBuffer::new()
    }

    fn current_swapchain_texture(&self) -> TextureHandle {
        self.swapchain_texture
    }

    fn resize(&self, width: u32, height: u32) {
        if self.size.get() == (width, height) {
            return;
        }
        self.size.set((width, height));
        if width == 0 || height == 0 {
            return;
        }
        log::debug!("resizing to {width}x{height}");
        {
            let mut config = self.config.borrow_mut();
            config.width = width;
            config.height = height;
            self.surface.configure(&self.device, &config);
        }

        let mut res = self.resources.borrow_mut();
        for (_, slot) in res.textures.iter_mut() {
            let TextureSlot::Gpu(gpu) = slot else {
                continue;
            };
            if gpu.size != TextureSize::Framebuffer {
                continue;
            }
            let desc = TextureDesc {
                format: gpu.format,
                size: TextureSize::Framebuffer,
                usage: gpu.usage,
                data: None,
                debug_name: &gpu.name,
            };
            let recreated = Texture::create(
                &self.device,
                &self.queue,
                &desc,
                (width, height),
                Some((&self.sampled_layout, &self.sampler)),
            );
            gpu.texture.texture.destroy();
            gpu.texture = recreated;
        }
    }

    fn register_ui_texture(&self, texture: TextureHandle) -> Result<egui::TextureId> {
        let res = self.resources.borrow();
        let gpu = res.gpu_texture(texture)?;
        anyhow::ensure!(
            gpu.usage.contains(wgpu::TextureUsages::TEXTURE_BINDING),
            "texture '{}' is not sampleable",
            gpu.name
        );
        let id = self.ui_renderer().register_native_texture(
            &self.device,
            &gpu.texture.view,
            wgpu::FilterMode::Linear,
        );
        log::debug!("registered texture '{}' as UI texture {id:?}", gpu.name);
        Ok(id)
    }

    fn unregister_ui_texture(&self, id: egui::TextureId) {
        self.ui_renderer().free_texture(&id);
    }

    fn submit(&self, cmd: CommandBuffer, present: Option<TextureHandle>) -> Result<()> {
        let commands = cmd.finish()?;
        if let Some(present) = present {
            anyhow::ensure!(
                present == self.swapchain_texture,
                "only the swapchain image can be presented, got {present:?}"
            );
        }
        let paint = render::ui_paint(&commands);
        if let Some(paint) = paint {
            self.stage_ui_textures(paint)?;
        }
        let presented = self.present_commands(&commands, present);
        if let Some(paint) = paint {
            self.release_ui_textures(paint);
        }
        presented
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let res = self.resources.get_mut();
        let live = res.buffers.len()
            + res.shaders.len()
            + res.pipelines.len()
            + res.textures.len().saturating_sub(2);
        if live > 0 {
            log::warn!("context dropped with {live} live resource(s)");
        }
        log::info!("context destroyed");
    }
}
