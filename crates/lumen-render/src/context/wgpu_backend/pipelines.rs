use std::collections::HashMap;

use super::convert;
use super::objects::ProgramObject;
use crate::context::shader::{FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::context::types::{BlendState, ProgramId, Topology, VertexLayout};

/// Everything a GL draw call implies about the wgpu render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub(super) program: ProgramId,
    pub(super) layout: VertexLayout,
    /// `None` when blending is disabled.
    pub(super) blend: Option<BlendState>,
    pub(super) format: wgpu::TextureFormat,
    pub(super) topology: Topology,
}

/// Render pipelines keyed by the state combination that produced them.
#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub(super) fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        program: &ProgramObject,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }

        log::debug!(
            "creating render pipeline for {:?} ({:?}, {:?})",
            key.program,
            key.format,
            key.topology
        );

        let attributes = convert::vertex_attributes(&key.layout);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen pipeline"),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: key.layout.stride as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend.as_ref().map(convert::blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: convert::topology(key.topology),
                strip_index_format: matches!(key.topology, Topology::TriangleStrip)
                    .then_some(wgpu::IndexFormat::Uint16),
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }

    pub(super) fn forget_program(&mut self, program: ProgramId) {
        self.pipelines.retain(|key, _| key.program != program);
    }

    pub(super) fn clear(&mut self) {
        self.pipelines.clear();
    }
}
