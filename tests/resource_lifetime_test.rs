#![cfg(feature = "headless")]

use hello_ngin::{
    context::RenderContext,
    data_structures::{desc::ShaderModuleDesc, handle::AnyHandle},
    egui,
    flow::{Flow, FrameLoop, FramePlatform, Sample},
    headless::HeadlessContext,
    pipelines::RenderPipelineDesc,
    samples::{ImageViewer, Triangle, Wireframe},
};

use crate::common::test_utils::{
    ScriptedPlatform, assert_all_destroyed_before_context, created, destroyed, init_test_logging,
    loader, test_config,
};
mod common;

async fn run_sample<S: Sample>(platform: &mut ScriptedPlatform) -> hello_ngin::headless::LifecycleLog {
    let assets = S::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let log = ctx.lifecycle();
    {
        let mut flow = S::build(&ctx, assets).unwrap();
        FrameLoop::new().drive(&ctx, platform, flow.as_mut()).unwrap();
    }
    assert_eq!(ctx.live_resources(), 0);
    log
}

fn assert_reverse_creation_order(log: &hello_ngin::headless::LifecycleLog) {
    let mut created = created(log);
    created.reverse();
    assert_eq!(destroyed(log), created);
}

#[tokio::test]
async fn triangle_releases_in_reverse_order() {
    init_test_logging();
    let log = run_sample::<Triangle>(&mut ScriptedPlatform::frames(2, (960, 540))).await;
    assert_eq!(created(&log).len(), 3);
    assert_reverse_creation_order(&log);
    assert_all_destroyed_before_context(&log);
}

#[tokio::test]
async fn wireframe_releases_in_reverse_order() {
    let log = run_sample::<Wireframe>(&mut ScriptedPlatform::frames(2, (960, 540))).await;
    assert_eq!(created(&log).len(), 7);
    assert_reverse_creation_order(&log);
    assert_all_destroyed_before_context(&log);
}

#[tokio::test]
async fn closing_before_the_first_frame_still_releases_everything() {
    let mut platform = ScriptedPlatform::closed();
    let log = run_sample::<Wireframe>(&mut platform).await;
    assert_eq!(platform.polls(), 0);
    assert_reverse_creation_order(&log);
    assert_all_destroyed_before_context(&log);
}

#[tokio::test]
async fn image_viewer_releases_in_reverse_order() {
    let log = run_sample::<ImageViewer>(&mut ScriptedPlatform::frames(3, (960, 540))).await;
    // Two shaders, the image and the quad pipeline; the UI keeps its textures
    // in the context's UI renderer.
    assert_eq!(created(&log).len(), 4);
    assert_reverse_creation_order(&log);
    assert_all_destroyed_before_context(&log);
}

#[tokio::test]
async fn ui_texture_loaded_mid_run_keeps_release_order() {
    let assets = ImageViewer::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let log = ctx.lifecycle();
    {
        let mut flow = ImageViewer::build_flow(&ctx, assets).unwrap();
        let built = created(&log);
        let mut platform = ScriptedPlatform::frames(4, (960, 540));
        let mut frame_loop = FrameLoop::new();
        let mut frame = |platform: &mut ScriptedPlatform, flow: &mut dyn Flow| {
            platform.poll_events();
            frame_loop.render_frame(&ctx, platform, flow).unwrap();
        };

        frame(&mut platform, &mut flow);
        let fonts = ctx.ui_texture_count();
        let late = flow.ui().context().load_texture(
            "late",
            egui::ColorImage::from_rgba_unmultiplied([4, 4], &[255; 64]),
            egui::TextureOptions::default(),
        );
        let late_id = late.id();

        frame(&mut platform, &mut flow);
        assert_eq!(ctx.ui_texture_size(late_id), Some([4, 4]));
        assert_eq!(ctx.ui_texture_count(), fonts + 1);

        drop(late);
        frame(&mut platform, &mut flow);
        frame(&mut platform, &mut flow);
        assert_eq!(ctx.ui_texture_size(late_id), None);
        assert_eq!(ctx.ui_texture_count(), fonts);

        // Nothing the UI does mid-run goes through resource creation.
        assert_eq!(created(&log), built);
    }
    assert_eq!(ctx.live_resources(), 0);
    drop(ctx);
    assert_reverse_creation_order(&log);
    assert_all_destroyed_before_context(&log);
}

#[test]
fn pipeline_creation_rejects_stale_shaders() {
    let ctx = HeadlessContext::default();
    let source = "@vertex fn vs_main() {} @fragment fn fs_main() {}";

    let vertex = ctx
        .create_shader_module(ShaderModuleDesc::new(source, "vertex"))
        .unwrap();
    let fragment = ctx
        .create_shader_module(ShaderModuleDesc::new(source, "fragment"))
        .unwrap();
    let desc = RenderPipelineDesc::new("ok", vertex.handle(), fragment.handle())
        .color(ctx.swapchain_format(), None);
    assert!(ctx.create_render_pipeline(&desc).is_ok());

    let stale = fragment.handle();
    drop(fragment);
    let desc = RenderPipelineDesc::new("stale", vertex.handle(), stale)
        .color(ctx.swapchain_format(), None);
    let err = ctx.create_render_pipeline(&desc).unwrap_err();
    assert!(err.to_string().contains("destroyed"), "{err}");
}

#[test]
fn destroying_twice_is_harmless() {
    let ctx = HeadlessContext::default();
    let shader = ctx
        .create_shader_module(ShaderModuleDesc::new("fn vs_main() {}", "shader"))
        .unwrap();
    let handle = shader.handle();
    drop(shader);
    ctx.destroy(AnyHandle::ShaderModule(handle));
    ctx.destroy(AnyHandle::Texture(ctx.current_swapchain_texture()));
    assert_eq!(destroyed(&ctx.lifecycle()).len(), 1);
    assert_eq!(ctx.live_resources(), 0);
}
