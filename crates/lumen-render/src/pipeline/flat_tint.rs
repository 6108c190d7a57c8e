use std::any::Any;

use glam::Vec2;

use super::batch::{Quad, TintEffect, TintVertex, VertexBatch};
use super::texture_tint::{TintUniforms, TINT_FRAGMENT_SHADER, TINT_VERTEX_SHADER};
use super::Pipeline;
use crate::color::Color;
use crate::context::GlContext;
use crate::error::Result;
use crate::geom::Rect;
use crate::renderer::RenderCore;
use crate::resources::{BufferHandle, ProgramHandle};

/// Untextured fills: rectangles, triangles, lines and convex polygons.
///
/// Draws with the renderer's blank texture on unit 0 so it can share the
/// tint program layout with [`super::TextureTintPipeline`].
#[derive(Debug)]
pub struct FlatTintPipeline {
    batch: VertexBatch,
}

impl FlatTintPipeline {
    pub fn new<G: GlContext>(core: &mut RenderCore<G>) -> Result<Self> {
        let quads = core.config().batch_size;
        let mut batch = VertexBatch::new(core, TINT_VERTEX_SHADER, TINT_FRAGMENT_SHADER, quads)?;
        let (width, height) = core.logical_size();
        batch.set_uniforms(bytemuck::bytes_of(&TintUniforms::new(width, height)));
        Ok(Self { batch })
    }

    fn bind_blank<G: GlContext>(&mut self, core: &mut RenderCore<G>) -> bool {
        match core.blank_texture() {
            Some(blank) => {
                self.batch.bind_texture(core, blank, 0);
                true
            }
            None => false,
        }
    }

    fn vertex(position: Vec2, color: Color) -> TintVertex {
        TintVertex {
            position: position.to_array(),
            tex_coord: [0.0, 0.0],
            tint_effect: 2.0,
            tint: color.packed(),
        }
    }

    pub fn batch_fill_rect<G: GlContext>(&mut self, core: &mut RenderCore<G>, rect: Rect, color: Color) {
        if !self.bind_blank(core) {
            return;
        }
        let quad = Quad::from_rect(rect, color).with_effect(TintEffect::Solid);
        self.batch.push_quad(core, quad.vertices(false));
    }

    pub fn batch_fill_triangle<G: GlContext>(&mut self, core: &mut RenderCore<G>, points: [Vec2; 3], color: Color) {
        if !self.bind_blank(core) {
            return;
        }
        self.batch.push_triangle(core, points.map(|p| Self::vertex(p, color)));
    }

    /// A `width` wide line from `a` to `b`.
    pub fn batch_line<G: GlContext>(&mut self, core: &mut RenderCore<G>, a: Vec2, b: Vec2, width: f32, color: Color) {
        let Some(dir) = (b - a).try_normalize() else { return };
        if !self.bind_blank(core) {
            return;
        }
        let offset = dir.perp() * (width * 0.5);
        let quad = [a - offset, a + offset, b + offset, b - offset].map(|p| Self::vertex(p, color));
        self.batch.push_quad(core, quad);
    }

    /// Fills a convex polygon as a triangle fan around its first point.
    pub fn batch_fill_polygon<G: GlContext>(&mut self, core: &mut RenderCore<G>, points: &[Vec2], color: Color) {
        if points.len() < 3 || !self.bind_blank(core) {
            return;
        }
        let anchor = points[0];
        for pair in points[1..].windows(2) {
            self.batch.push_triangle(core, [anchor, pair[0], pair[1]].map(|p| Self::vertex(p, color)));
        }
    }

    pub fn flush_batch<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        self.batch.flush(core);
    }
}

impl<G: GlContext> Pipeline<G> for FlatTintPipeline {
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
    use crate::context::GlCall;
    use crate::renderer::test_support::headless;

    #[test]
    fn fills_sample_the_blank_texture() {
        let mut r = headless(32, 32);
        let id = r.default_pipelines().flat_tint;
        r.with_pipeline::<FlatTintPipeline, _>(id, None, |p, core| {
            p.batch_fill_rect(core, Rect::new(0.0, 0.0, 8.0, 8.0), Color::BLACK);
            p.batch_fill_triangle(core, [Vec2::ZERO, Vec2::X, Vec2::Y], Color::WHITE);
            p.batch_line(core, Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0, Color::WHITE);
            p.flush_batch(core);
        });

        let blank = r.blank_texture().unwrap();
        assert_eq!(r.state().texture(0), Some(blank));
        let gl = r.context();
        assert!(gl.calls().contains(&GlCall::DrawArrays { topology: crate::context::Topology::Triangles, first: 0, count: 15 }));
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn degenerate_shapes_queue_nothing() {
        let mut r = headless(32, 32);
        let id = r.default_pipelines().flat_tint;
        r.context_mut().clear_calls();
        r.with_pipeline::<FlatTintPipeline, _>(id, None, |p, core| {
            p.batch_line(core, Vec2::ONE, Vec2::ONE, 2.0, Color::WHITE);
            p.batch_fill_polygon(core, &[Vec2::ZERO, Vec2::X], Color::WHITE);
            p.flush_batch(core);
        });
        assert_eq!(r.context().count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 0);
    }

    #[test]
    fn polygon_fans_from_the_first_point() {
        let mut r = headless(32, 32);
        let id = r.default_pipelines().flat_tint;
        let square = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        r.with_pipeline::<FlatTintPipeline, _>(id, None, |p, core| {
            p.batch_fill_polygon(core, &square, Color::WHITE);
            p.flush_batch(core);
        });
        assert!(r.context().calls().contains(&GlCall::DrawArrays {
            topology: crate::context::Topology::Triangles,
            first: 0,
            count: 6
        }));
    }
}
