use std::any::Any;

use bytemuck::{Pod, Zeroable};

use super::Pipeline;
use crate::context::{BufferUsage, GlContext, Topology, VertexFormat, VertexLayout};
use crate::error::Result;
use crate::renderer::RenderCore;
use crate::resources::{BufferHandle, BufferInit, ProgramHandle, TextureHandle};

const MASK_VERTEX_SHADER: &str = include_str!("../../shaders/mask.vert.wgsl");
const MASK_FRAGMENT_SHADER: &str = include_str!("../../shaders/mask.frag.wgsl");

/// One triangle covering clip space.
const FULL_SCREEN: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct MaskUniforms {
    options: [f32; 4],
}

/// Composites a masked object's render target with a mask's alpha.
///
/// Draws immediately in [`BitmapMaskPipeline::draw_mask`]; there is never
/// anything to flush.
#[derive(Debug)]
pub struct BitmapMaskPipeline {
    program: ProgramHandle,
    vertex_buffer: BufferHandle,
    layout: VertexLayout,
}

impl BitmapMaskPipeline {
    pub fn new<G: GlContext>(core: &mut RenderCore<G>) -> Result<Self> {
        let program = core.create_program(MASK_VERTEX_SHADER, MASK_FRAGMENT_SHADER)?;
        let vertices = bytemuck::cast_slice(&FULL_SCREEN);
        let vertex_buffer = match core.create_vertex_buffer(BufferInit::Data(vertices), BufferUsage::Static) {
            Ok(buffer) => buffer,
            Err(err) => {
                core.delete_program(program);
                return Err(err);
            }
        };
        Ok(Self {
            program,
            vertex_buffer,
            layout: VertexLayout::packed(&[VertexFormat::Float32x2]),
        })
    }

    /// Draws `main` (unit 0) through `mask` (unit 1) into the bound
    /// framebuffer. `invert` keeps what the mask does not cover.
    pub fn draw_mask<G: GlContext>(
        &mut self,
        core: &mut RenderCore<G>,
        main: TextureHandle,
        mask: TextureHandle,
        invert: bool,
    ) {
        if !core.is_active() {
            return;
        }
        let state = core.state();
        if state.program() != Some(self.program) || state.vertex_buffer() != Some(self.vertex_buffer) {
            self.bind_program(core);
        }

        core.set_texture_2d(Some(main), 0, |_| {});
        core.set_texture_2d(Some(mask), 1, |_| {});

        let uniforms = MaskUniforms { options: [if invert { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0] };
        core.set_uniform_block(bytemuck::bytes_of(&uniforms));
        core.draw_arrays(Topology::Triangles, 0, FULL_SCREEN.len() as u32);
    }

    fn bind_program<G: GlContext>(&mut self, core: &mut RenderCore<G>) {
        core.set_program(Some(self.program), |_| {});
        core.set_vertex_buffer(Some(self.vertex_buffer), |_| {});
        core.gl_mut().vertex_layout(&self.layout);
    }
}

impl<G: GlContext> Pipeline<G> for BitmapMaskPipeline {
    fn program(&self) -> ProgramHandle {
        self.program
    }

    fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    fn bind(&mut self, core: &mut RenderCore<G>) {
        if core.is_active() {
            self.bind_program(core);
        }
    }

    fn flush(&mut self, _core: &mut RenderCore<G>) {}

    fn resize(&mut self, _width: f32, _height: f32, _resolution: f32) {}

    fn destroy(&mut self, core: &mut RenderCore<G>) {
        core.delete_program(self.program);
        core.delete_buffer(self.vertex_buffer);
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
    use crate::resources::TextureDescriptor;

    #[test]
    fn draw_mask_binds_both_units_and_draws_one_triangle() {
        let mut r = headless(16, 16);
        let main = r.create_texture_2d(TextureDescriptor::new(16, 16)).unwrap();
        let mask = r.create_texture_2d(TextureDescriptor::new(16, 16)).unwrap();
        let id = r.default_pipelines().bitmap_mask;
        r.context_mut().clear_calls();

        r.with_pipeline::<BitmapMaskPipeline, _>(id, None, |p, core| p.draw_mask(core, main, mask, true));

        assert_eq!(r.state().texture(0), Some(main));
        assert_eq!(r.state().texture(1), Some(mask));
        let gl = r.context();
        assert!(gl.calls().contains(&GlCall::UniformBlock(16)));
        assert!(gl.calls().contains(&GlCall::DrawArrays { topology: Topology::Triangles, first: 0, count: 3 }));
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }
}
