use crate::pipelines::RenderPipelineDesc;

/// Builds the pipeline layout for `desc`: `texture_groups` copies of the
/// sampled texture layout and one push constant range shared by both stages.
pub fn mk_pipeline_layout(
    device: &wgpu::Device,
    desc: &RenderPipelineDesc<'_>,
    sampled_layout: &wgpu::BindGroupLayout,
) -> wgpu::PipelineLayout {
    let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
        (0..desc.texture_groups).map(|_| sampled_layout).collect();
    let push_constant_ranges: &[wgpu::PushConstantRange] = if desc.push_constant_size > 0 {
        &[wgpu::PushConstantRange {
            stages: wgpu::ShaderStages::VERTEX_FRAGMENT,
            range: 0..desc.push_constant_size,
        }]
    } else {
        &[]
    };

    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(desc.name),
        bind_group_layouts: &bind_group_layouts,
        push_constant_ranges,
    })
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    desc: &RenderPipelineDesc<'_>,
    vert: &wgpu::ShaderModule,
    frag: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let attributes = desc
        .vertex_input
        .as_ref()
        .map(|input| input.attributes.as_slice())
        .unwrap_or_default();
    let vertex_layouts: Vec<wgpu::VertexBufferLayout> = desc
        .vertex_input
        .iter()
        .map(|input| wgpu::VertexBufferLayout {
            array_stride: input.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();
    let targets: Vec<Option<wgpu::ColorTargetState>> = desc
        .color_targets
        .iter()
        .map(|target| {
            Some(wgpu::ColorTargetState {
                format: target.format,
                blend: target.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    let strip_index_format = match desc.topology {
        wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip => {
            Some(wgpu::IndexFormat::Uint32)
        }
        _ => None,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(desc.name),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vert,
            entry_point: Some(desc.vertex.entry_point),
            buffers: &vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: frag,
            entry_point: Some(desc.fragment.entry_point),
            targets: &targets,
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &desc.spec_constants,
                ..Default::default()
            },
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: desc.cull_mode,
            polygon_mode: desc.polygon_mode,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: desc.depth.map(|depth| wgpu::DepthStencilState {
            format: depth.format,
            depth_write_enabled: depth.write,
            depth_compare: depth.compare,
            stencil: wgpu::StencilState::default(),
            bias: desc.depth_bias,
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
