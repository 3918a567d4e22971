#![cfg(feature = "headless")]

use hello_ngin::{
    context::RenderContext,
    flow::{FrameLoop, Sample},
    headless::HeadlessContext,
    render::{Command, LoadOp},
    samples::Triangle,
};

use crate::common::test_utils::{ScriptedPlatform, init_test_logging, loader, test_config};
mod common;

#[tokio::test]
async fn should_draw_three_vertices_on_white() {
    init_test_logging();
    let assets = Triangle::load(&loader(), &test_config()).await.unwrap();

    let ctx = HeadlessContext::default();
    {
        let mut flow = Triangle::build(&ctx, assets).unwrap();
        let mut platform = ScriptedPlatform::frames(1, (960, 540));
        FrameLoop::new()
            .drive(&ctx, &mut platform, flow.as_mut())
            .unwrap();
    }

    assert_eq!(ctx.framebuffer_size(), (960, 540));
    let submissions = ctx.submissions();
    assert_eq!(submissions.len(), 1);
    let frame = &submissions[0];
    assert_eq!(frame.present, Some(ctx.current_swapchain_texture()));

    let draws: Vec<_> = frame.draws().collect();
    assert_eq!(
        draws,
        vec![&Command::Draw {
            vertex_count: 3,
            instance_count: 1
        }]
    );
    assert!(
        !frame
            .commands
            .iter()
            .any(|c| matches!(c, Command::BindIndexBuffer { .. } | Command::BindVertexBuffer { .. }))
    );

    let Command::BeginRendering { pass, framebuffer } = &frame.commands[0] else {
        panic!("frame does not start with a render pass: {:?}", frame.commands[0]);
    };
    assert_eq!(pass.color[0].load, LoadOp::Clear);
    assert_eq!(pass.color[0].clear_colour, wgpu::Color::WHITE);
    assert_eq!(pass.depth, None);
    assert_eq!(framebuffer.color, vec![ctx.current_swapchain_texture()]);
    assert!(frame.commands.contains(&Command::PushDebugGroup("Render Triangle".into())));
}

#[tokio::test]
async fn pipeline_has_no_vertex_input() {
    let assets = Triangle::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let mut flow = Triangle::build(&ctx, assets).unwrap();
    let mut platform = ScriptedPlatform::frames(1, (960, 540));
    FrameLoop::new()
        .drive(&ctx, &mut platform, flow.as_mut())
        .unwrap();

    let pipeline = ctx.submissions()[0]
        .commands
        .iter()
        .find_map(|c| match c {
            Command::BindRenderPipeline(p) => Some(*p),
            _ => None,
        })
        .unwrap();
    let recorded = ctx.pipeline(pipeline).unwrap();
    assert!(!recorded.has_vertex_input);
    assert_eq!(recorded.topology, wgpu::PrimitiveTopology::TriangleList);
    assert_eq!(recorded.push_constant_size, 0);
}
