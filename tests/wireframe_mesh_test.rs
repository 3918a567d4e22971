#![cfg(feature = "headless")]

use hello_ngin::{
    context::RenderContext,
    data_structures::handle::AnyHandle,
    flow::{FrameLoop, Sample},
    headless::{HeadlessConfig, HeadlessContext, LifecycleEvent},
    render::Command,
    samples::{
        Wireframe,
        wireframe::{WIREFRAME_CONSTANT, WIREFRAME_DEPTH_BIAS},
    },
};

use crate::common::test_utils::{
    ScriptedPlatform, created_bytes, init_test_logging, loader, test_config,
};
mod common;

// assets/models/cube.obj: 8 vertices, 6 quads.
const CUBE_VERTICES: u64 = 8;
const CUBE_TRIANGLES: u64 = 12;

#[tokio::test]
async fn should_size_buffers_from_the_mesh() {
    init_test_logging();
    let assets = Wireframe::load(&loader(), &test_config()).await.unwrap();
    assert_eq!(assets.mesh.vertex_count() as u64, CUBE_VERTICES);
    assert_eq!(assets.mesh.triangle_count() as u64, CUBE_TRIANGLES);

    let ctx = HeadlessContext::default();
    let log = ctx.lifecycle();
    let _flow = Wireframe::build(&ctx, assets).unwrap();

    assert_eq!(created_bytes(&log, "mesh vertices"), Some(CUBE_VERTICES * 12));
    assert_eq!(created_bytes(&log, "mesh indices"), Some(CUBE_TRIANGLES * 3 * 4));
}

#[tokio::test]
async fn should_draw_solid_then_wireframe() {
    let assets = Wireframe::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let mut flow = Wireframe::build(&ctx, assets).unwrap();
    let mut platform = ScriptedPlatform::frames(3, (960, 540));
    FrameLoop::new()
        .drive(&ctx, &mut platform, flow.as_mut())
        .unwrap();

    let submissions = ctx.submissions();
    assert_eq!(submissions.len(), 3);
    for frame in submissions.iter() {
        let draws: Vec<_> = frame.draws().cloned().collect();
        let expected = Command::DrawIndexed {
            index_count: (CUBE_TRIANGLES * 3) as u32,
            instance_count: 1,
            first_index: 0,
            vertex_offset: 0,
        };
        assert_eq!(draws, vec![expected.clone(), expected]);

        let Command::BeginRendering { pass, framebuffer } = &frame.commands[0] else {
            panic!("frame does not start with a render pass");
        };
        assert_eq!(pass.depth.map(|d| d.clear_depth), Some(1.0));
        assert!(framebuffer.depth.is_some());
    }

    let pipelines: Vec<_> = submissions[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            Command::BindRenderPipeline(p) => ctx.pipeline(*p),
            _ => None,
        })
        .collect();
    assert_eq!(pipelines.len(), 2);
    let (solid, wire) = (&pipelines[0], &pipelines[1]);

    assert_eq!(solid.polygon_mode, wgpu::PolygonMode::Fill);
    assert_eq!(solid.depth_bias, wgpu::DepthBiasState::default());
    assert_eq!(solid.spec_constants, vec![(WIREFRAME_CONSTANT.to_string(), 0.0)]);

    assert_eq!(wire.polygon_mode, wgpu::PolygonMode::Line);
    assert_eq!(wire.depth_bias, WIREFRAME_DEPTH_BIAS);
    assert_eq!(wire.spec_constants, vec![(WIREFRAME_CONSTANT.to_string(), 1.0)]);

    assert!(solid.has_vertex_input && wire.has_vertex_input);
    assert_eq!(solid.depth_format, wire.depth_format);
}

#[tokio::test]
async fn push_constants_precede_each_draw() {
    let assets = Wireframe::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let mut flow = Wireframe::build(&ctx, assets).unwrap();
    let mut platform = ScriptedPlatform::frames(1, (640, 480));
    FrameLoop::new()
        .drive(&ctx, &mut platform, flow.as_mut())
        .unwrap();

    let submissions = ctx.submissions();
    let commands = &submissions[0].commands;
    let pushes: Vec<&Vec<u8>> = commands
        .iter()
        .filter_map(|c| match c {
            Command::PushConstants(data) => Some(data),
            _ => None,
        })
        .collect();
    assert_eq!(pushes.len(), 2);
    assert!(pushes.iter().all(|block| block.len() == 80));
    // Untextured: texture index 0 right after the matrix.
    assert!(pushes.iter().all(|block| block[64..68] == [0, 0, 0, 0]));
}

#[tokio::test]
async fn build_fails_without_line_polygon_mode() {
    let assets = Wireframe::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::new(HeadlessConfig {
        features: wgpu::Features::PUSH_CONSTANTS,
        ..Default::default()
    });

    let err = Wireframe::build(&ctx, assets).err().unwrap();
    assert!(format!("{err:#}").contains("mesh wireframe"), "{err:#}");
    assert_eq!(ctx.live_resources(), 0);
}

#[tokio::test]
async fn resizing_rebuilds_the_depth_texture_in_place() {
    let assets = Wireframe::load(&loader(), &test_config()).await.unwrap();
    let ctx = HeadlessContext::default();
    let log = ctx.lifecycle();
    {
        let mut flow = Wireframe::build(&ctx, assets).unwrap();
        let mut platform = ScriptedPlatform::new([(960, 540), (640, 480), (0, 0), (800, 600)]);
        let mut frame_loop = FrameLoop::new();
        frame_loop
            .drive(&ctx, &mut platform, flow.as_mut())
            .unwrap();
        assert_eq!(frame_loop.frames(), 3);
        assert_eq!(frame_loop.skipped(), 1);
    }

    // The zero-sized frame neither resized nor submitted.
    assert_eq!(ctx.acquired_command_buffers(), 3);
    assert_eq!(ctx.framebuffer_size(), (800, 600));
    let submissions = ctx.submissions();
    assert_eq!(submissions.len(), 3);

    let depths: Vec<_> = submissions
        .iter()
        .flat_map(|s| &s.commands)
        .filter_map(|c| match c {
            Command::BeginRendering { framebuffer, .. } => Some(framebuffer.depth),
            _ => None,
        })
        .collect();
    assert_eq!(depths.len(), 3);
    let depth = depths[0].expect("wireframe pass has no depth target");
    assert!(depths.iter().all(|d| *d == Some(depth)));

    let recreated: Vec<_> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Recreated {
                handle,
                width,
                height,
            } => Some((*handle, *width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(
        recreated,
        vec![
            (AnyHandle::Texture(depth), 640, 480),
            (AnyHandle::Texture(depth), 800, 600),
        ]
    );
}
