//! Command recording.
//!
//! A [`CommandBuffer`] is a plain list of [`Command`]s. Programs record into it
//! during a frame and hand it back to the context with
//! [`RenderContext::submit`](crate::context::RenderContext::submit), which
//! validates and replays the list in order.
//!
//! # Key types
//!
//! - [`CommandBuffer`] records commands and checks their structure on [`finish`](CommandBuffer::finish)
//! - [`Command`] is one recorded GPU command
//! - [`RenderPass`] holds per-attachment load/clear policy
//! - [`Framebuffer`] names the textures a pass renders into
//! - [`UiPaint`] is the tessellated UI of one frame, painted by the context
//!
//! The texture changes carried by a [`UiPaint`] are staged uploads: the
//! context applies them before any render pass of the same submission
//! executes, and also when the frame is skipped because the surface was lost,
//! outdated or timed out. Textures the UI freed are released after the frame.

use std::{fmt, sync::Arc};

use anyhow::{Result, bail};

use crate::data_structures::handle::{
    AnyHandle, BufferHandle, RenderPipelineHandle, TextureHandle,
};

/// Load policy and clear colour of one colour attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorAttachmentOps {
    pub load: LoadOp,
    pub clear_colour: wgpu::Color,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthAttachmentOps {
    pub load: LoadOp,
    pub clear_depth: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    Clear,
    Load,
}

/// Attachment policy of a render pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPass {
    pub color: Vec<ColorAttachmentOps>,
    pub depth: Option<DepthAttachmentOps>,
}

impl RenderPass {
    /// One colour attachment cleared to `colour`.
    pub fn clear(colour: wgpu::Color) -> Self {
        Self {
            color: vec![ColorAttachmentOps {
                load: LoadOp::Clear,
                clear_colour: colour,
            }],
            depth: None,
        }
    }

    /// Adds a depth attachment cleared to `depth`.
    pub fn with_depth_clear(mut self, depth: f32) -> Self {
        self.depth = Some(DepthAttachmentOps {
            load: LoadOp::Clear,
            clear_depth: depth,
        });
        self
    }
}

/// Render targets of a pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    pub color: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
}

impl Framebuffer {
    pub fn color(target: TextureHandle) -> Self {
        Self {
            color: vec![target],
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: TextureHandle) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Physical size and scale the UI was laid out for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UiScreen {
    pub size_in_pixels: [u32; 2],
    pub pixels_per_point: f32,
}

/// Output of one UI frame: clipped meshes plus the texture changes they need.
///
/// Cloning is cheap; two paints compare equal when they share the same output.
#[derive(Clone)]
pub struct UiPaint {
    pub primitives: Arc<[egui::ClippedPrimitive]>,
    pub textures_delta: Arc<egui::TexturesDelta>,
    pub screen: UiScreen,
}

impl UiPaint {
    pub fn new(
        primitives: Vec<egui::ClippedPrimitive>,
        textures_delta: egui::TexturesDelta,
        screen: UiScreen,
    ) -> Self {
        Self {
            primitives: primitives.into(),
            textures_delta: Arc::new(textures_delta),
            screen,
        }
    }

    /// Textures sampled by the meshes of this paint.
    pub fn mesh_textures(&self) -> impl Iterator<Item = egui::TextureId> + '_ {
        self.primitives.iter().filter_map(|clipped| match &clipped.primitive {
            egui::epaint::Primitive::Mesh(mesh) => Some(mesh.texture_id),
            egui::epaint::Primitive::Callback(_) => None,
        })
    }
}

impl PartialEq for UiPaint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.primitives, &other.primitives)
            && Arc::ptr_eq(&self.textures_delta, &other.textures_delta)
            && self.screen == other.screen
    }
}

impl fmt::Debug for UiPaint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiPaint")
            .field("primitives", &self.primitives.len())
            .field("texture_sets", &self.textures_delta.set.len())
            .field("texture_frees", &self.textures_delta.free.len())
            .field("screen", &self.screen)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginRendering {
        pass: RenderPass,
        framebuffer: Framebuffer,
    },
    EndRendering,
    BindRenderPipeline(RenderPipelineHandle),
    BindVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        format: wgpu::IndexFormat,
    },
    BindTexture {
        group: u32,
        texture: TextureHandle,
    },
    PushConstants(Vec<u8>),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    PushDebugGroup(String),
    PopDebugGroup,
    /// Paints the UI into the open pass. Leaves no pipeline or index buffer
    /// bound for the commands that follow.
    PaintUi(UiPaint),
}

impl Command {
    /// Every resource handle this command touches.
    pub fn referenced_handles(&self) -> Vec<AnyHandle> {
        match self {
            Command::BeginRendering { framebuffer, .. } => framebuffer
                .color
                .iter()
                .chain(framebuffer.depth.iter())
                .map(|h| AnyHandle::Texture(*h))
                .collect(),
            Command::BindRenderPipeline(pipeline) => vec![AnyHandle::RenderPipeline(*pipeline)],
            Command::BindVertexBuffer { buffer, .. } | Command::BindIndexBuffer { buffer, .. } => {
                vec![AnyHandle::Buffer(*buffer)]
            }
            Command::BindTexture { texture, .. } => vec![AnyHandle::Texture(*texture)],
            _ => Vec::new(),
        }
    }
}

/// Recorded, not yet submitted GPU work.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn begin_rendering(&mut self, pass: &RenderPass, framebuffer: &Framebuffer) {
        self.commands.push(Command::BeginRendering {
            pass: pass.clone(),
            framebuffer: framebuffer.clone(),
        });
    }

    pub fn end_rendering(&mut self) {
        self.commands.push(Command::EndRendering);
    }

    pub fn bind_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(Command::BindRenderPipeline(pipeline));
    }

    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.commands.push(Command::BindVertexBuffer { slot, buffer });
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, format: wgpu::IndexFormat) {
        self.commands.push(Command::BindIndexBuffer { buffer, format });
    }

    pub fn bind_texture(&mut self, group: u32, texture: TextureHandle) {
        self.commands.push(Command::BindTexture { group, texture });
    }

    pub fn push_constants<T: bytemuck::Pod>(&mut self, value: &T) {
        self.commands
            .push(Command::PushConstants(bytemuck::bytes_of(value).to_vec()));
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) {
        self.commands.push(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
        });
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.commands.push(Command::PushDebugGroup(label.to_string()));
    }

    pub fn pop_debug_group(&mut self) {
        self.commands.push(Command::PopDebugGroup);
    }

    pub fn paint_ui(&mut self, paint: UiPaint) {
        self.commands.push(Command::PaintUi(paint));
    }

    /// Checks the structure of the recording and hands out the command list.
    ///
    /// Render passes must not nest and must be closed, draws and pass state
    /// commands must sit inside a pass with a bound pipeline, indexed draws
    /// need an index buffer, and debug groups must be balanced within the
    /// scope (pass or outside) that opened them. The UI is painted at most
    /// once per submission, into a pass without a depth target.
    pub fn finish(self) -> Result<Vec<Command>> {
        let mut in_pass = false;
        let mut pass_has_depth = false;
        let mut ui_painted = false;
        let mut pipeline_bound = false;
        let mut index_bound = false;
        let mut groups_outside = 0usize;
        let mut groups_inside = 0usize;

        for (i, command) in self.commands.iter().enumerate() {
            match command {
                Command::BeginRendering { pass, framebuffer } => {
                    if in_pass {
                        bail!("command {i}: render pass begun inside another render pass");
                    }
                    if pass.color.len() != framebuffer.color.len() {
                        bail!(
                            "command {i}: {} colour ops for {} colour targets",
                            pass.color.len(),
                            framebuffer.color.len()
                        );
                    }
                    if pass.depth.is_some() != framebuffer.depth.is_some() {
                        bail!("command {i}: depth ops and depth target must come together");
                    }
                    in_pass = true;
                    pass_has_depth = framebuffer.depth.is_some();
                    pipeline_bound = false;
                    index_bound = false;
                }
                Command::EndRendering => {
                    if !in_pass {
                        bail!("command {i}: render pass ended without being begun");
                    }
                    if groups_inside != 0 {
                        bail!("command {i}: {groups_inside} debug group(s) left open in the pass");
                    }
                    in_pass = false;
                }
                Command::BindRenderPipeline(_) => {
                    ensure_in_pass(in_pass, i, "pipeline bind")?;
                    pipeline_bound = true;
                }
                Command::BindIndexBuffer { .. } => {
                    ensure_in_pass(in_pass, i, "index buffer bind")?;
                    index_bound = true;
                }
                Command::BindVertexBuffer { .. } | Command::BindTexture { .. } => {
                    ensure_in_pass(in_pass, i, "pass state")?
                }
                Command::PushConstants(data) => {
                    ensure_in_pass(in_pass, i, "push constants")?;
                    if !pipeline_bound {
                        bail!("command {i}: push constants without a bound pipeline");
                    }
                    if data.len() % 4 != 0 {
                        bail!("command {i}: push constant block of {} bytes", data.len());
                    }
                }
                Command::Draw { .. } => {
                    ensure_in_pass(in_pass, i, "draw")?;
                    if !pipeline_bound {
                        bail!("command {i}: draw without a bound pipeline");
                    }
                }
                Command::DrawIndexed { .. } => {
                    ensure_in_pass(in_pass, i, "indexed draw")?;
                    if !pipeline_bound || !index_bound {
                        bail!("command {i}: indexed draw needs a pipeline and an index buffer");
                    }
                }
                Command::PushDebugGroup(_) => {
                    if in_pass {
                        groups_inside += 1;
                    } else {
                        groups_outside += 1;
                    }
                }
                Command::PopDebugGroup => {
                    let depth = if in_pass {
                        &mut groups_inside
                    } else {
                        &mut groups_outside
                    };
                    if *depth == 0 {
                        bail!("command {i}: debug group popped without a push");
                    }
                    *depth -= 1;
                }
                Command::PaintUi(_) => {
                    ensure_in_pass(in_pass, i, "UI paint")?;
                    if pass_has_depth {
                        bail!("command {i}: the UI paints into colour-only passes");
                    }
                    if ui_painted {
                        bail!("command {i}: the UI is painted once per submission");
                    }
                    ui_painted = true;
                    pipeline_bound = false;
                    index_bound = false;
                }
            }
        }

        if in_pass {
            bail!("render pass left open at the end of the command buffer");
        }
        if groups_outside != 0 {
            bail!("{groups_outside} debug group(s) left open");
        }
        Ok(self.commands)
    }
}

/// The UI paint of a finished command list, if any.
pub fn ui_paint(commands: &[Command]) -> Option<&UiPaint> {
    commands.iter().find_map(|c| match c {
        Command::PaintUi(paint) => Some(paint),
        _ => None,
    })
}

fn ensure_in_pass(in_pass: bool, index: usize, what: &str) -> Result<()> {
    if !in_pass {
        bail!("command {index}: {what} outside a render pass");
    }
    Ok(())
}
