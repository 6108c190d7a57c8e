use std::any::Any;

use bytemuck::{Pod, Zeroable};

use super::batch::{projection, Quad, VertexBatch};
use super::Pipeline;
use crate::color::Color;
use crate::context::GlContext;
use crate::error::Result;
use crate::geom::Rect;
use crate::renderer::RenderCore;
use crate::resources::{BufferHandle, ProgramHandle, TextureHandle};

pub(super) const TINT_VERTEX_SHADER: &str = include_str!("../../shaders/tint.vert.wgsl");
pub(super) const TINT_FRAGMENT_SHADER: &str = include_str!("../../shaders/tint.frag.wgsl");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct TintUniforms {
    pub projection: [[f32; 4]; 4],
}

impl TintUniforms {
    pub fn new(width: f32, height: f32) -> Self {
        Self { projection: projection(width, height).to_cols_array_2d() }
    }
}

/// Batches textured, tinted quads. One draw per run of quads sharing a
/// texture, blend mode and scissor.
#[derive(Debug)]
pub struct TextureTintPipeline {
    batch: VertexBatch,
}

impl TextureTintPipeline {
    pub fn new<G: GlContext>(core: &mut RenderCore<G>) -> Result<Self> {
        let quads = core.config().batch_size;
        let mut batch = VertexBatch::new(core, TINT_VERTEX_SHADER, TINT_FRAGMENT_SHADER, quads)?;
        let (width, height) = core.logical_size();
        batch.set_uniforms(bytemuck::bytes_of(&TintUniforms::new(width, height)));
        Ok(Self { batch })
    }

    /// Queues `quad` sampling `texture`. Switching textures flushes.
    pub fn batch_quad<G: GlContext>(&mut self, core: &mut RenderCore<G>, texture: TextureHandle, quad: &Quad) {
        let Some(flip_v) = core.texture(texture).map(|t| t.flip_y) else {
            log::warn!("batch_quad with stale texture {texture:?}");
            return;
        };
        self.batch.bind_texture(core, texture, 0);
        self.batch.push_quad(core, quad.vertices(flip_v));
    }

    pub fn batch_rect<G: GlContext>(&mut self, core: &mut RenderCore<G>, texture: TextureHandle, rect: Rect, tint: Color) {
        self.batch_quad(core, texture, &Quad::from_rect(rect, tint));
    }

    pub fn flush_batch<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        self.batch.flush(core);
    }

    /// Queued vertices.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }
}

impl<G: GlContext> Pipeline<G> for TextureTintPipeline {
    fn program(&self) -> ProgramHandle {
        self.batch.program()
    }

    fn vertex_buffer(&self) -> BufferHandle {
        self.batch.vertex_buffer()
    }

    fn bind(&mut self, core: &mut RenderCore<G>) {
        self.batch.bind(core);
    }

    fn flush(&mut self, core: &mut RenderCore<G>) {
        self.batch.flush(core);
    }

    fn resize(&mut self, width: f32, height: f32, _resolution: f32) {
        self.batch.set_uniforms(bytemuck::bytes_of(&TintUniforms::new(width, height)));
    }

    fn destroy(&mut self, core: &mut RenderCore<G>) {
        self.batch.destroy(core);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlCall, Topology};
    use crate::renderer::test_support::headless;
    use crate::resources::TextureDescriptor;

    fn draws(calls: &[GlCall]) -> Vec<u32> {
        calls
            .iter()
            .filter_map(|c| match c {
                GlCall::DrawArrays { topology: Topology::Triangles, count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn quads_sharing_a_texture_draw_once() {
        let mut r = headless(64, 64);
        let tex = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let id = r.default_pipelines().texture_tint;
        r.context_mut().clear_calls();

        for i in 0..3 {
            r.with_pipeline::<TextureTintPipeline, _>(id, None, |p, core| {
                p.batch_rect(core, tex, Rect::new(i as f32, 0.0, 4.0, 4.0), Color::WHITE)
            });
        }
        assert_eq!(draws(r.context().calls()), Vec::<u32>::new());

        r.flush();
        assert_eq!(draws(r.context().calls()), vec![18]);
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn a_b_a_textures_flush_at_each_switch() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let b = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let id = r.default_pipelines().texture_tint;
        r.context_mut().clear_calls();

        for tex in [a, b, a] {
            r.with_pipeline::<TextureTintPipeline, _>(id, None, |p, core| {
                p.batch_rect(core, tex, Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE)
            });
        }
        r.flush();

        let binds = r.context().count_calls(|c| matches!(c, GlCall::BindTexture(Some(_))));
        assert_eq!(binds, 3);
        assert_eq!(draws(r.context().calls()), vec![6, 6, 6]);
    }

    #[test]
    fn full_batch_flushes_before_overflowing_the_buffer() {
        let config = crate::config::RendererConfig { batch_size: 2, ..Default::default() }.with_size(32, 32);
        let mut r = crate::renderer::Renderer::new(crate::context::HeadlessContext::new(32, 32), config).unwrap();
        let tex = r.create_texture_2d(TextureDescriptor::new(2, 2)).unwrap();
        let id = r.default_pipelines().texture_tint;

        r.with_pipeline::<TextureTintPipeline, _>(id, None, |p, core| {
            for _ in 0..5 {
                p.batch_rect(core, tex, Rect::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
            }
            p.flush_batch(core);
        });

        assert_eq!(draws(r.context().calls()), vec![12, 12, 6]);
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn flush_rebinds_after_a_buffer_was_created_mid_batch() {
        let mut r = headless(32, 32);
        let tex = r.create_texture_2d(TextureDescriptor::new(2, 2)).unwrap();
        let id = r.default_pipelines().texture_tint;
        r.with_pipeline::<TextureTintPipeline, _>(id, None, |p, core| {
            p.batch_rect(core, tex, Rect::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
            core.create_vertex_buffer(crate::resources::BufferInit::Size(8), crate::context::BufferUsage::Static)
                .unwrap();
            p.flush_batch(core);
        });

        assert_eq!(draws(r.context().calls()), vec![6]);
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn stale_texture_is_ignored() {
        let mut r = headless(32, 32);
        let tex = r.create_texture_2d(TextureDescriptor::new(2, 2)).unwrap();
        r.delete_texture(tex);
        let id = r.default_pipelines().texture_tint;
        let pending = r
            .with_pipeline::<TextureTintPipeline, _>(id, None, |p, core| {
                p.batch_rect(core, tex, Rect::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
                p.pending()
            })
            .unwrap();
        assert_eq!(pending, 0);
    }
}
