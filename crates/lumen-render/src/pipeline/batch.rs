use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Mat4, Vec2};

use crate::color::Color;
use crate::context::{BufferTarget, BufferUsage, GlContext, Topology, VertexFormat, VertexLayout};
use crate::error::Result;
use crate::geom::Rect;
use crate::renderer::RenderCore;
use crate::resources::{BufferHandle, BufferInit, ProgramHandle, TextureHandle};

/// How the fragment stage combines texel and tint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TintEffect {
    /// `texel * tint`.
    #[default]
    Multiply,
    /// Tint color replaces the texel color, texel alpha is kept.
    Fill,
    /// Tint only; the texture is ignored.
    Solid,
}

impl TintEffect {
    fn as_f32(self) -> f32 {
        match self {
            TintEffect::Multiply => 0.0,
            TintEffect::Fill => 1.0,
            TintEffect::Solid => 2.0,
        }
    }
}

/// Vertex shared by the tint and light programs.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TintVertex {
    /// Logical pixels, top-left origin.
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
    pub tint_effect: f32,
    /// Straight-alpha RGBA8, see [`Color::packed`].
    pub tint: u32,
}

impl TintVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(&[
            VertexFormat::Float32x2,
            VertexFormat::Float32x2,
            VertexFormat::Float32,
            VertexFormat::Unorm8x4,
        ])
    }
}

/// Textured, tinted quad in logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    /// Top-left, bottom-left, bottom-right, top-right.
    pub corners: [Vec2; 4],
    /// Normalized texture area.
    pub uv: Rect,
    /// Per-corner tint, same order as `corners`.
    pub tint: [Color; 4],
    pub effect: TintEffect,
}

impl Quad {
    pub fn from_rect(rect: Rect, tint: Color) -> Self {
        let (min, max) = (rect.min(), rect.max());
        Self {
            corners: [min, Vec2::new(min.x, max.y), max, Vec2::new(max.x, min.y)],
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            tint: [tint; 4],
            effect: TintEffect::Multiply,
        }
    }

    /// A `size` quad whose local origin sits at `origin` (0–1 of the size),
    /// placed by `transform`.
    pub fn transformed(size: Vec2, origin: Vec2, transform: Affine2, tint: Color) -> Self {
        let local = Rect::new(-origin.x * size.x, -origin.y * size.y, size.x, size.y);
        let mut quad = Self::from_rect(local, tint);
        for corner in &mut quad.corners {
            *corner = transform.transform_point2(*corner);
        }
        quad
    }

    pub fn with_uv(mut self, uv: Rect) -> Self {
        self.uv = uv;
        self
    }

    pub fn with_effect(mut self, effect: TintEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Snaps every corner to whole pixels.
    pub fn rounded(mut self) -> Self {
        for corner in &mut self.corners {
            *corner = corner.round();
        }
        self
    }

    pub(crate) fn vertices(&self, flip_v: bool) -> [TintVertex; 4] {
        let (u0, u1) = (self.uv.min().x, self.uv.max().x);
        let (mut v0, mut v1) = (self.uv.min().y, self.uv.max().y);
        if flip_v {
            (v0, v1) = (1.0 - v0, 1.0 - v1);
        }
        let uvs = [[u0, v0], [u0, v1], [u1, v1], [u1, v0]];
        let effect = self.effect.as_f32();
        std::array::from_fn(|i| TintVertex {
            position: self.corners[i].to_array(),
            tex_coord: uvs[i],
            tint_effect: effect,
            tint: self.tint[i].packed(),
        })
    }
}

/// Orthographic projection for a `width × height` logical surface,
/// top-left origin.
pub fn projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, height, 0.0, -1000.0, 1000.0)
}

/// A program, a dynamic vertex buffer and the CPU-side vertices waiting
/// for it.
///
/// Flushing re-binds the program and vertex buffer when anything else was
/// bound in between, so a batch can be flushed from any tracker callback.
#[derive(Debug)]
pub struct VertexBatch {
    program: ProgramHandle,
    vertex_buffer: BufferHandle,
    layout: VertexLayout,
    vertices: Vec<TintVertex>,
    /// In vertices.
    capacity: usize,
    uniforms: Vec<u8>,
    uniforms_dirty: bool,
}

impl VertexBatch {
    /// Creates the program and a vertex buffer for `quads` quads.
    pub fn new<G: GlContext>(
        core: &mut RenderCore<G>,
        vertex_source: &str,
        fragment_source: &str,
        quads: usize,
    ) -> Result<Self> {
        let capacity = quads.max(1) * 6;
        let program = core.create_program(vertex_source, fragment_source)?;
        let size = capacity * size_of::<TintVertex>();
        let vertex_buffer = match core.create_vertex_buffer(BufferInit::Size(size), BufferUsage::Dynamic) {
            Ok(buffer) => buffer,
            Err(err) => {
                core.delete_program(program);
                return Err(err);
            }
        };

        Ok(Self {
            program,
            vertex_buffer,
            layout: TintVertex::layout(),
            vertices: Vec::with_capacity(capacity),
            capacity,
            uniforms: Vec::new(),
            uniforms_dirty: false,
        })
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    /// Queued vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replaces the uniform block. Uploaded at the next bind or flush, so
    /// queued vertices must be flushed first.
    pub fn set_uniforms(&mut self, data: &[u8]) {
        debug_assert!(self.vertices.is_empty(), "uniforms changed under a pending batch");
        self.uniforms.clear();
        self.uniforms.extend_from_slice(data);
        self.uniforms_dirty = true;
    }

    pub fn bind<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        if !core.is_active() {
            return;
        }
        core.set_program(Some(self.program), |_| {});
        core.set_vertex_buffer(Some(self.vertex_buffer), |_| {});
        core.gl_mut().vertex_layout(&self.layout);
        self.upload_uniforms(core);
    }

    fn upload_uniforms<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        if !self.uniforms.is_empty() {
            core.set_uniform_block(&self.uniforms);
        }
        self.uniforms_dirty = false;
    }

    /// Binds `texture` on `unit`, flushing this batch first when that
    /// changes the binding.
    pub fn bind_texture<G: GlContext>(&mut self, core: &mut RenderCore<G>, texture: TextureHandle, unit: usize) {
        core.set_texture_2d(Some(texture), unit, |core| self.flush(core));
    }

    pub fn push_quad<G: GlContext>(&mut self, core: &mut RenderCore<G>, quad: [TintVertex; 4]) {
        if self.vertices.len() + 6 > self.capacity {
            self.flush(core);
        }
        let [a, b, c, d] = quad;
        self.vertices.extend_from_slice(&[a, b, c, a, c, d]);
    }

    pub fn push_triangle<G: GlContext>(&mut self, core: &mut RenderCore<G>, triangle: [TintVertex; 3]) {
        if self.vertices.len() + 3 > self.capacity {
            self.flush(core);
        }
        self.vertices.extend_from_slice(&triangle);
    }

    /// Uploads and draws the queued vertices.
    pub fn flush<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        if self.vertices.is_empty() {
            return;
        }
        if !core.is_active() {
            self.vertices.clear();
            return;
        }

        let state = core.state();
        let rebind = state.program() != Some(self.program)
            || state.vertex_buffer() != Some(self.vertex_buffer);
        if rebind {
            self.bind(core);
        } else if self.uniforms_dirty {
            self.upload_uniforms(core);
        }

        core.gl_mut()
            .buffer_sub_data(BufferTarget::Vertex, 0, bytemuck::cast_slice(&self.vertices));
        core.draw_arrays(Topology::Triangles, 0, self.vertices.len() as u32);
        self.vertices.clear();
    }

    pub fn destroy<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        self.vertices.clear();
        core.delete_program(self.program);
        core.delete_buffer(self.vertex_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(size_of::<TintVertex>(), 24);
        assert_eq!(TintVertex::layout().stride, 24);
    }

    #[test]
    fn quad_from_rect_winds_around_the_rect() {
        let quad = Quad::from_rect(Rect::new(1.0, 2.0, 3.0, 4.0), Color::WHITE);
        assert_eq!(
            quad.corners,
            [Vec2::new(1.0, 2.0), Vec2::new(1.0, 6.0), Vec2::new(4.0, 6.0), Vec2::new(4.0, 2.0)]
        );
        let verts = quad.vertices(false);
        assert_eq!(verts[0].tex_coord, [0.0, 0.0]);
        assert_eq!(verts[2].tex_coord, [1.0, 1.0]);
        assert_eq!(verts[0].tint, u32::MAX);
    }

    #[test]
    fn flipped_textures_swap_v() {
        let quad = Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE)
            .with_uv(Rect::new(0.0, 0.25, 1.0, 0.5));
        let verts = quad.vertices(true);
        assert_eq!(verts[0].tex_coord, [0.0, 0.75]);
        assert_eq!(verts[1].tex_coord, [0.0, 0.25]);
    }

    #[test]
    fn transformed_quad_rotates_about_its_origin() {
        let transform = Affine2::from_angle_translation(std::f32::consts::FRAC_PI_2, Vec2::new(10.0, 10.0));
        let quad = Quad::transformed(Vec2::new(2.0, 2.0), Vec2::splat(0.5), transform, Color::WHITE).rounded();
        // Top-left (-1, -1) rotated a quarter turn lands at (1, -1).
        assert_eq!(quad.corners[0], Vec2::new(11.0, 9.0));
    }

    #[test]
    fn projection_maps_corners_to_clip_space() {
        let p = projection(100.0, 50.0);
        let tl = p.project_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        let br = p.project_point3(glam::Vec3::new(100.0, 50.0, 0.0));
        assert!((tl.x + 1.0).abs() < 1e-5 && (tl.y - 1.0).abs() < 1e-5);
        assert!((br.x - 1.0).abs() < 1e-5 && (br.y + 1.0).abs() < 1e-5);
    }
}
