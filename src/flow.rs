//! Frame loop and program driver.
//!
//! A program is a [`Sample`]: it loads its assets asynchronously, builds its
//! GPU resources once against a [`RenderContext`] and returns a [`Flow`] that
//! records the commands of one frame. [`run`] wires everything together:
//!
//! 1. Install the logger and open the window
//! 2. Load assets on a current-thread tokio runtime
//! 3. Create the wgpu [`Context`] for the window
//! 4. Build the flow, then hand it to the [`FrameLoop`] until the window closes
//! 5. Drop the flow (and every resource it holds) before the context
//!
//! # Lifecycle of one frame
//!
//! The loop polls platform events, reads the framebuffer size and skips the
//! frame when either dimension is zero. Otherwise it resizes the context,
//! acquires a command buffer, lets the flow record into it and submits it
//! together with the swapchain image.

use std::future::Future;

use anyhow::{Context as _, Result};
use instant::Instant;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::{
    config::AppConfig,
    context::{Context, RenderContext},
    input::InputState,
    logging::init_logging,
    render::CommandBuffer,
    resources::AssetLoader,
    window::{WindowShim, WinitPlatform},
};

/// Per-frame values handed to [`Flow::on_render`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Number of frames submitted before this one.
    pub index: u64,
    /// Seconds since the loop started.
    pub time: f64,
    pub framebuffer: (u32, u32),
    pub pixels_per_point: f32,
}

/// Records the draw commands of one frame.
pub trait Flow {
    /// Called once per rendered frame with a freshly acquired command buffer.
    /// The buffer is submitted (with the swapchain image) right after.
    fn on_render(
        &mut self,
        ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        frame: &FrameInfo,
        input: &InputState,
    ) -> Result<()>;
}

/// A self-contained demonstration program.
///
/// Loading is split from building so assets are read before the GPU exists
/// and everything GPU-side is created in one front-loaded step.
pub trait Sample {
    type Assets;

    fn load(
        loader: &AssetLoader,
        config: &AppConfig,
    ) -> impl Future<Output = Result<Self::Assets>>;

    /// Creates every resource the flow needs. The returned flow borrows `ctx`
    /// and therefore cannot outlive it.
    fn build<'c>(ctx: &'c dyn RenderContext, assets: Self::Assets) -> Result<Box<dyn Flow + 'c>>;
}

/// What the frame loop needs from the windowing side.
pub trait FramePlatform {
    /// Processes pending events without blocking.
    fn poll_events(&mut self);

    fn should_close(&self) -> bool;

    /// Current size of the drawable area in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    fn pixels_per_point(&self) -> f32;

    fn input(&self) -> &InputState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// The framebuffer had a zero dimension; nothing was acquired or submitted.
    Skipped,
}

pub struct FrameLoop {
    state: LoopState,
    start: Instant,
    frames: u64,
    skipped: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Running,
            start: Instant::now(),
            frames: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Checked at the top of every iteration; observing the close flag moves
    /// the loop to [`LoopState::Closed`] for good.
    pub fn should_continue<P: FramePlatform + ?Sized>(&mut self, platform: &P) -> bool {
        if self.state == LoopState::Closed {
            return false;
        }
        if platform.should_close() {
            log::info!(
                "leaving the frame loop after {} frames ({} skipped)",
                self.frames,
                self.skipped
            );
            self.state = LoopState::Closed;
            return false;
        }
        true
    }

    pub fn render_frame<P: FramePlatform + ?Sized>(
        &mut self,
        ctx: &dyn RenderContext,
        platform: &P,
        flow: &mut dyn Flow,
    ) -> Result<FrameOutcome> {
        let (width, height) = platform.framebuffer_size();
        if width == 0 || height == 0 {
            log::trace!("framebuffer is {width}x{height}, skipping frame");
            self.skipped += 1;
            return Ok(FrameOutcome::Skipped);
        }
        ctx.resize(width, height);

        let frame = FrameInfo {
            index: self.frames,
            time: self.start.elapsed().as_secs_f64(),
            framebuffer: (width, height),
            pixels_per_point: platform.pixels_per_point(),
        };
        let mut cmd = ctx.acquire_command_buffer();
        flow.on_render(ctx, &mut cmd, &frame, platform.input())
            .with_context(|| format!("recording frame {}", frame.index))?;
        ctx.submit(cmd, Some(ctx.current_swapchain_texture()))
            .with_context(|| format!("submitting frame {}", frame.index))?;
        self.frames += 1;
        Ok(FrameOutcome::Rendered)
    }

    /// Runs until the platform reports close or a frame fails.
    pub fn drive<P: FramePlatform + ?Sized>(
        &mut self,
        ctx: &dyn RenderContext,
        platform: &mut P,
        flow: &mut dyn Flow,
    ) -> Result<()> {
        while self.should_continue(platform) {
            platform.poll_events();
            self.render_frame(ctx, platform, flow)?;
        }
        Ok(())
    }
}

/// Runs sample `S` in a window until it is closed.
///
/// Any error is logged once and returned; `main` turns it into a non-zero
/// exit code.
pub fn run<S: Sample>(config: AppConfig) -> Result<()> {
    init_logging(config.logging.clone());
    let result = run_inner::<S>(&config);
    if let Err(e) = &result {
        log::error!("{e:#}");
    }
    result
}

fn run_inner<S: Sample>(config: &AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let mut event_loop = EventLoop::new().context("failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut shim = WindowShim::new(config.window.clone());
    let window = shim.open(&mut event_loop)?;

    log::info!("loading assets from {}", config.assets.display());
    let loader = AssetLoader::new(&config.assets);
    let assets = runtime.block_on(S::load(&loader, config))?;

    let ctx = runtime.block_on(Context::new(window, &config.context))?;
    let mut platform = WinitPlatform::new(event_loop, shim);
    {
        let mut flow = S::build(&ctx, assets)?;
        log::info!("entering the frame loop");
        FrameLoop::new().drive(&ctx, &mut platform, flow.as_mut())?;
    }
    log::info!("resources released");
    Ok(())
}
