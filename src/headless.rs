//! A [`RenderContext`] without a GPU.
//!
//! `HeadlessContext` applies the same validation as the wgpu context
//! (descriptors, handle liveness, command buffer structure, device features)
//! but instead of talking to a device it records what happened: a lifecycle
//! log of resource creation and destruction and every submitted command list.
//! The lifecycle log is shared through an `Rc` so it can still be inspected
//! after the context itself has been dropped.
//!
//! UI textures are tracked the way the UI renderer would hold them: allocated
//! and patched by the texture deltas of each submission, freed after it.

use std::{
    cell::{Cell, Ref, RefCell},
    collections::HashMap,
    rc::Rc,
};

use anyhow::{Context as _, Result, bail};

use crate::{
    context::{RenderContext, stale},
    data_structures::{
        desc::{BufferDesc, ShaderModuleDesc, TextureDesc, TextureSize},
        handle::{
            AnyHandle, BufferKind, Pool, RenderPipelineHandle, RenderPipelineKind,
            ShaderModuleKind, TextureHandle, TextureKind,
        },
        holder::Holder,
    },
    pipelines::RenderPipelineDesc,
    render::{self, Command, CommandBuffer, UiPaint},
};

#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    Created {
        handle: AnyHandle,
        name: String,
        bytes: u64,
    },
    Destroyed {
        handle: AnyHandle,
        name: String,
    },
    /// A framebuffer-sized texture was rebuilt in place for a new extent.
    Recreated {
        handle: AnyHandle,
        width: u32,
        height: u32,
    },
    ContextDestroyed,
}

pub type LifecycleLog = Rc<RefCell<Vec<LifecycleEvent>>>;

/// One call to [`RenderContext::submit`].
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub commands: Vec<Command>,
    pub present: Option<TextureHandle>,
}

impl Submission {
    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. } | Command::DrawIndexed { .. }))
    }
}

/// What the headless context remembers about a pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedPipeline {
    pub name: String,
    pub topology: wgpu::PrimitiveTopology,
    pub polygon_mode: wgpu::PolygonMode,
    pub cull_mode: Option<wgpu::Face>,
    pub depth_bias: wgpu::DepthBiasState,
    pub spec_constants: Vec<(String, f64)>,
    pub push_constant_size: u32,
    pub has_vertex_input: bool,
    pub depth_format: Option<wgpu::TextureFormat>,
}

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    pub framebuffer: (u32, u32),
    pub swapchain_format: wgpu::TextureFormat,
    pub features: wgpu::Features,
    pub max_push_constant_size: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            framebuffer: (960, 540),
            swapchain_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            features: wgpu::Features::PUSH_CONSTANTS | wgpu::Features::POLYGON_MODE_LINE,
            max_push_constant_size: 128,
        }
    }
}

struct Entry {
    name: String,
}

struct TextureEntry {
    name: String,
    usage: wgpu::TextureUsages,
    size: TextureSize,
}

struct ShaderEntry {
    name: String,
    source: String,
}

#[derive(Default)]
struct Resources {
    buffers: Pool<BufferKind, Entry>,
    textures: Pool<TextureKind, TextureEntry>,
    shaders: Pool<ShaderModuleKind, ShaderEntry>,
    pipelines: Pool<RenderPipelineKind, RecordedPipeline>,
}

impl Resources {
    fn contains(&self, handle: AnyHandle) -> bool {
        match handle {
            AnyHandle::Buffer(h) => self.buffers.contains(h),
            AnyHandle::Texture(h) => self.textures.contains(h),
            AnyHandle::ShaderModule(h) => self.shaders.contains(h),
            AnyHandle::RenderPipeline(h) => self.pipelines.contains(h),
        }
    }
}

pub struct HeadlessContext {
    resources: RefCell<Resources>,
    white_texture: TextureHandle,
    swapchain_texture: TextureHandle,
    framebuffer: Cell<(u32, u32)>,
    acquired: Cell<usize>,
    lose_surface: Cell<bool>,
    skipped: Cell<usize>,
    ui_textures: RefCell<HashMap<egui::TextureId, [usize; 2]>>,
    ui_user_textures: RefCell<HashMap<egui::TextureId, TextureHandle>>,
    next_ui_user_id: Cell<u64>,
    submissions: RefCell<Vec<Submission>>,
    lifecycle: LifecycleLog,
    config: HeadlessConfig,
}

impl HeadlessContext {
    pub fn new(config: HeadlessConfig) -> Self {
        let mut resources = Resources::default();
        let white_texture = resources.textures.insert(TextureEntry {
            name: "white".to_string(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            size: TextureSize::Fixed {
                width: 1,
                height: 1,
            },
        });
        let swapchain_texture = resources.textures.insert(TextureEntry {
            name: "swapchain".to_string(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            size: TextureSize::Framebuffer,
        });
        Self {
            resources: RefCell::new(resources),
            white_texture,
            swapchain_texture,
            framebuffer: Cell::new(config.framebuffer),
            acquired: Cell::new(0),
            lose_surface: Cell::new(false),
            skipped: Cell::new(0),
            ui_textures: RefCell::new(HashMap::new()),
            ui_user_textures: RefCell::new(HashMap::new()),
            next_ui_user_id: Cell::new(0),
            submissions: RefCell::new(Vec::new()),
            lifecycle: Rc::new(RefCell::new(Vec::new())),
            config,
        }
    }

    /// Shared handle to the lifecycle log; outlives the context.
    pub fn lifecycle(&self) -> LifecycleLog {
        self.lifecycle.clone()
    }

    pub fn submissions(&self) -> Ref<'_, Vec<Submission>> {
        self.submissions.borrow()
    }

    /// Number of command buffers handed out so far.
    pub fn acquired_command_buffers(&self) -> usize {
        self.acquired.get()
    }

    /// Makes the next submission find the surface lost: its staged UI
    /// texture changes are applied, nothing is recorded or presented.
    pub fn lose_surface_on_next_submit(&self) {
        self.lose_surface.set(true);
    }

    /// Submissions dropped because the surface was lost.
    pub fn skipped_submissions(&self) -> usize {
        self.skipped.get()
    }

    /// Size of a UI texture allocated through texture deltas.
    pub fn ui_texture_size(&self, id: egui::TextureId) -> Option<[usize; 2]> {
        self.ui_textures.borrow().get(&id).copied()
    }

    pub fn ui_texture_count(&self) -> usize {
        self.ui_textures.borrow().len()
    }

    /// Context texture behind a registered UI user texture.
    pub fn ui_user_texture(&self, id: egui::TextureId) -> Option<TextureHandle> {
        self.ui_user_textures.borrow().get(&id).copied()
    }

    pub fn pipeline(&self, handle: RenderPipelineHandle) -> Option<RecordedPipeline> {
        self.resources.borrow().pipelines.get(handle).cloned()
    }

    /// Resources that are currently alive, reserved textures excluded.
    pub fn live_resources(&self) -> usize {
        let res = self.resources.borrow();
        res.buffers.len() + res.textures.len() - 2 + res.shaders.len() + res.pipelines.len()
    }

    fn created(&self, handle: AnyHandle, name: &str, bytes: u64) {
        log::debug!("created {} '{name}'", handle.kind_name());
        self.lifecycle.borrow_mut().push(LifecycleEvent::Created {
            handle,
            name: name.to_string(),
            bytes,
        });
    }

    fn stage_ui_textures(&self, paint: &UiPaint) -> Result<()> {
        let mut textures = self.ui_textures.borrow_mut();
        for (id, delta) in &paint.textures_delta.set {
            let size = delta.image.size();
            match delta.pos {
                None => {
                    log::trace!("allocating UI texture {id:?} {}x{}", size[0], size[1]);
                    textures.insert(*id, size);
                }
                Some([x, y]) => {
                    let full = textures
                        .get(id)
                        .with_context(|| format!("patch for unallocated UI texture {id:?}"))?;
                    anyhow::ensure!(
                        x + size[0] <= full[0] && y + size[1] <= full[1],
                        "patch at {x},{y} of {}x{} exceeds UI texture {id:?}",
                        size[0],
                        size[1]
                    );
                }
            }
        }
        Ok(())
    }

    fn release_ui_textures(&self, paint: &UiPaint) {
        let mut textures = self.ui_textures.borrow_mut();
        for id in &paint.textures_delta.free {
            log::trace!("freeing UI texture {id:?}");
            textures.remove(id);
        }
    }

    fn record(
        &self,
        commands: Vec<Command>,
        present: Option<TextureHandle>,
        paint: Option<&UiPaint>,
    ) -> Result<()> {
        if let Some(paint) = paint {
            self.check_ui_meshes(paint)?;
        }
        self.submissions
            .borrow_mut()
            .push(Submission { commands, present });
        Ok(())
    }

    /// Every mesh of the paint samples an allocated or registered texture.
    fn check_ui_meshes(&self, paint: &UiPaint) -> Result<()> {
        let textures = self.ui_textures.borrow();
        let users = self.ui_user_textures.borrow();
        let res = self.resources.borrow();
        for id in paint.mesh_textures() {
            match id {
                egui::TextureId::Managed(_) => anyhow::ensure!(
                    textures.contains_key(&id),
                    "UI mesh samples unallocated texture {id:?}"
                ),
                egui::TextureId::User(_) => {
                    let handle = users
                        .get(&id)
                        .with_context(|| format!("UI mesh samples unregistered texture {id:?}"))?;
                    if !res.textures.contains(*handle) {
                        return Err(stale(AnyHandle::Texture(*handle)));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl RenderContext for HeadlessContext {
    fn swapchain_format(&self) -> wgpu::TextureFormat {
        self.config.swapchain_format
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer.get()
    }

    fn features(&self) -> wgpu::Features {
        self.config.features
    }

    fn create_buffer(&self, desc: BufferDesc<'_>) -> Result<Holder<'_, BufferKind>> {
        let size = desc.validate()?;
        let handle = self.resources.borrow_mut().buffers.insert(Entry {
            name: desc.debug_name.to_string(),
        });
        self.created(AnyHandle::Buffer(handle), desc.debug_name, size);
        Ok(Holder::new(self, handle))
    }

    fn create_texture(&self, desc: TextureDesc<'_>) -> Result<Holder<'_, TextureKind>> {
        let (width, height) = desc.validate(self.framebuffer.get())?;
        let texel = desc.format.block_copy_size(None).unwrap_or(4) as u64;
        let handle = self.resources.borrow_mut().textures.insert(TextureEntry {
            name: desc.debug_name.to_string(),
            usage: desc.usage,
            size: desc.size,
        });
        self.created(
            AnyHandle::Texture(handle),
            desc.debug_name,
            width as u64 * height as u64 * texel,
        );
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
        let handle = self.resources.borrow_mut().shaders.insert(ShaderEntry {
            name: desc.debug_name.to_string(),
            source: desc.source.to_string(),
        });
        self.created(
            AnyHandle::ShaderModule(handle),
            desc.debug_name,
            desc.source.len() as u64,
        );
        Ok(Holder::new(self, handle))
    }

    fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<Holder<'_, RenderPipelineKind>> {
        desc.validate(self.config.features, self.config.max_push_constant_size)?;
        let recorded = {
            let res = self.resources.borrow();
            for stage in [&desc.vertex, &desc.fragment] {
                let shader = res
                    .shaders
                    .get(stage.module)
                    .ok_or_else(|| stale(AnyHandle::ShaderModule(stage.module)))?;
                if !shader.source.contains(&format!("fn {}", stage.entry_point)) {
                    bail!(
                        "pipeline '{}': shader '{}' has no entry point '{}'",
                        desc.name,
                        shader.name,
                        stage.entry_point
                    );
                }
            }
            RecordedPipeline {
                name: desc.name.to_string(),
                topology: desc.topology,
                polygon_mode: desc.polygon_mode,
                cull_mode: desc.cull_mode,
                depth_bias: desc.depth_bias,
                spec_constants: desc
                    .spec_constants
                    .iter()
                    .map(|(name, value)| (name.to_string(), *value))
                    .collect(),
                push_constant_size: desc.push_constant_size,
                has_vertex_input: desc.vertex_input.is_some(),
                depth_format: desc.depth.map(|d| d.format),
            }
        };
        let handle = self.resources.borrow_mut().pipelines.insert(recorded);
        self.created(AnyHandle::RenderPipeline(handle), desc.name, 0);
        Ok(Holder::new(self, handle))
    }

    fn destroy(&self, handle: AnyHandle) {
        if let AnyHandle::Texture(h) = handle {
            if h == self.white_texture || h == self.swapchain_texture {
                log::warn!("refusing to destroy reserved texture {h:?}");
                return;
            }
        }
        let mut res = self.resources.borrow_mut();
        let name = match handle {
            AnyHandle::Buffer(h) => res.buffers.remove(h).map(|e| e.name),
            AnyHandle::Texture(h) => res.textures.remove(h).map(|e| e.name),
            AnyHandle::ShaderModule(h) => res.shaders.remove(h).map(|e| e.name),
            AnyHandle::RenderPipeline(h) => res.pipelines.remove(h).map(|p| p.name),
        };
        match name {
            Some(name) => {
                log::debug!("destroyed {} '{name}'", handle.kind_name());
                self.lifecycle
                    .borrow_mut()
                    .push(LifecycleEvent::Destroyed { handle, name });
            }
            None => log::warn!("destroy called with stale handle {handle:?}"),
        }
    }

    fn acquire_command_buffer(&self) -> CommandBuffer {
        self.acquired.set(self.acquired.get() + 1);
        CommandBuffer::new()
    }

    fn current_swapchain_texture(&self) -> TextureHandle {
        self.swapchain_texture
    }

    fn resize(&self, width: u32, height: u32) {
        if self.framebuffer.get() == (width, height) {
            return;
        }
        self.framebuffer.set((width, height));
        if width == 0 || height == 0 {
            return;
        }
        log::debug!("resizing to {width}x{height}");
        let res = self.resources.borrow();
        let mut lifecycle = self.lifecycle.borrow_mut();
        for (handle, entry) in res.textures.iter() {
            if handle == self.swapchain_texture || entry.size != TextureSize::Framebuffer {
                continue;
            }
            log::debug!("recreated texture '{}' at {width}x{height}", entry.name);
            lifecycle.push(LifecycleEvent::Recreated {
                handle: AnyHandle::Texture(handle),
                width,
                height,
            });
        }
    }

    fn register_ui_texture(&self, texture: TextureHandle) -> Result<egui::TextureId> {
        let res = self.resources.borrow();
        let entry = res
            .textures
            .get(texture)
            .ok_or_else(|| stale(AnyHandle::Texture(texture)))?;
        anyhow::ensure!(
            entry.usage.contains(wgpu::TextureUsages::TEXTURE_BINDING),
            "texture '{}' is not sampleable",
            entry.name
        );
        let id = egui::TextureId::User(self.next_ui_user_id.get());
        self.next_ui_user_id.set(self.next_ui_user_id.get() + 1);
        self.ui_user_textures.borrow_mut().insert(id, texture);
        log::debug!("registered texture '{}' as UI texture {id:?}", entry.name);
        Ok(id)
    }

    fn unregister_ui_texture(&self, id: egui::TextureId) {
        if self.ui_user_textures.borrow_mut().remove(&id).is_none() {
            log::warn!("unregistering unknown UI texture {id:?}");
        }
    }

    fn submit(&self, cmd: CommandBuffer, present: Option<TextureHandle>) -> Result<()> {
        let commands = cmd.finish()?;
        if let Some(present) = present {
            anyhow::ensure!(
                present == self.swapchain_texture,
                "only the swapchain image can be presented, got {present:?}"
            );
        }
        {
            let res = self.resources.borrow();
            for handle in commands.iter().flat_map(Command::referenced_handles) {
                if !res.contains(handle) {
                    return Err(stale(handle));
                }
            }
        }

        let paint = render::ui_paint(&commands).cloned();
        if let Some(paint) = &paint {
            self.stage_ui_textures(paint)?;
        }
        let presented = if self.lose_surface.replace(false) {
            log::warn!("skipping frame: surface lost");
            self.skipped.set(self.skipped.get() + 1);
            Ok(())
        } else {
            self.record(commands, present, paint.as_ref())
        };
        if let Some(paint) = &paint {
            self.release_ui_textures(paint);
        }
        presented
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        let live = self.live_resources();
        if live > 0 {
            log::warn!("context dropped with {live} live resource(s)");
        }
        self.lifecycle
            .borrow_mut()
            .push(LifecycleEvent::ContextDestroyed);
    }
}
