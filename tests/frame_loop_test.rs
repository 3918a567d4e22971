#![cfg(feature = "headless")]

use anyhow::Result;
use hello_ngin::{
    context::RenderContext,
    flow::{Flow, FrameInfo, FrameLoop, FrameOutcome, LoopState},
    headless::HeadlessContext,
    input::InputState,
    render::{CommandBuffer, Framebuffer, RenderPass},
};

use crate::common::test_utils::{ScriptedPlatform, init_test_logging};
mod common;

/// Clears the swapchain and remembers what it was asked to render.
#[derive(Default)]
struct Recorder {
    frames: Vec<FrameInfo>,
}

impl Flow for Recorder {
    fn on_render(
        &mut self,
        ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        frame: &FrameInfo,
        _input: &InputState,
    ) -> Result<()> {
        self.frames.push(*frame);
        cmd.begin_rendering(
            &RenderPass::clear(wgpu::Color::BLACK),
            &Framebuffer::color(ctx.current_swapchain_texture()),
        );
        cmd.end_rendering();
        Ok(())
    }
}

/// Records a draw outside of any render pass.
struct Broken;

impl Flow for Broken {
    fn on_render(
        &mut self,
        _ctx: &dyn RenderContext,
        cmd: &mut CommandBuffer,
        _frame: &FrameInfo,
        _input: &InputState,
    ) -> Result<()> {
        cmd.draw(3, 1);
        Ok(())
    }
}

#[test]
fn zero_sized_frames_are_skipped() {
    init_test_logging();
    let ctx = HeadlessContext::default();
    let mut flow = Recorder::default();
    let mut platform = ScriptedPlatform::new([(960, 540), (0, 540), (960, 0), (0, 0), (800, 600)]);
    let mut frame_loop = FrameLoop::new();

    frame_loop.drive(&ctx, &mut platform, &mut flow).unwrap();

    assert_eq!(platform.polls(), 5);
    assert_eq!(frame_loop.frames(), 2);
    assert_eq!(frame_loop.skipped(), 3);
    assert_eq!(ctx.acquired_command_buffers(), 2);
    assert_eq!(ctx.submissions().len(), 2);
    assert_eq!(ctx.framebuffer_size(), (800, 600));

    let sizes: Vec<_> = flow.frames.iter().map(|f| f.framebuffer).collect();
    assert_eq!(sizes, vec![(960, 540), (800, 600)]);
    assert_eq!(flow.frames[0].index, 0);
    assert_eq!(flow.frames[1].index, 1);
    assert!(flow.frames[1].time >= flow.frames[0].time);
}

#[test]
fn skipped_frame_does_not_touch_the_context() {
    let ctx = HeadlessContext::default();
    let mut flow = Recorder::default();
    let platform = ScriptedPlatform::new([(0, 0)]);
    let mut frame_loop = FrameLoop::new();

    let outcome = frame_loop.render_frame(&ctx, &platform, &mut flow).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(ctx.acquired_command_buffers(), 0);
    assert!(ctx.submissions().is_empty());
    assert!(flow.frames.is_empty());
}

#[test]
fn close_is_observed_at_the_top_of_an_iteration() {
    let ctx = HeadlessContext::default();
    let mut flow = Recorder::default();
    let mut platform = ScriptedPlatform::closed();
    let mut frame_loop = FrameLoop::new();

    frame_loop.drive(&ctx, &mut platform, &mut flow).unwrap();
    assert_eq!(frame_loop.state(), LoopState::Closed);
    assert_eq!(platform.polls(), 0);
    assert_eq!(ctx.acquired_command_buffers(), 0);

    // Closed is final.
    assert!(!frame_loop.should_continue(&ScriptedPlatform::frames(1, (1, 1))));
}

#[test]
fn each_frame_presents_the_swapchain() {
    let ctx = HeadlessContext::default();
    let mut flow = Recorder::default();
    let mut platform = ScriptedPlatform::frames(4, (320, 200));
    FrameLoop::new().drive(&ctx, &mut platform, &mut flow).unwrap();

    let swapchain = ctx.current_swapchain_texture();
    assert!(ctx.submissions().iter().all(|s| s.present == Some(swapchain)));
    assert_eq!(ctx.submissions().len(), 4);
}

#[test]
fn invalid_recording_ends_the_loop_with_an_error() {
    let ctx = HeadlessContext::default();
    let mut platform = ScriptedPlatform::frames(5, (960, 540));
    let mut frame_loop = FrameLoop::new();

    let err = frame_loop
        .drive(&ctx, &mut platform, &mut Broken)
        .unwrap_err();
    assert!(format!("{err:#}").contains("outside a render pass"), "{err:#}");
    assert_eq!(platform.polls(), 1);
    assert_eq!(frame_loop.frames(), 0);
    assert!(ctx.submissions().is_empty());
}
