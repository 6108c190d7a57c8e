use std::any::Any;

use bytemuck::{Pod, Zeroable};

use super::batch::{projection, Quad, VertexBatch};
use super::{Pipeline, Renderable};
use crate::color::Color;
use crate::context::GlContext;
use crate::error::Result;
use crate::geom::Rect;
use crate::renderer::RenderCore;
use crate::resources::{BufferHandle, ProgramHandle, TextureDescriptor, TextureHandle};
use crate::scene::{Camera, Scene};

const LIGHT_VERTEX_SHADER: &str = include_str!("../../shaders/light.vert.wgsl");
const LIGHT_FRAGMENT_SHADER: &str = include_str!("../../shaders/light.frag.wgsl");

/// Lights shaded per camera pass. Must match the fragment shader.
pub const MAX_LIGHTS: usize = 10;

/// Flat normal (0, 0, 1) encoded as a texel.
const DEFAULT_NORMAL: [u8; 4] = [128, 128, 255, 255];

const NORMAL_MAP_UNIT: usize = 1;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
struct LightData {
    position: [f32; 2],
    radius: f32,
    intensity: f32,
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct LightUniforms {
    projection: [[f32; 4]; 4],
    resolution: [f32; 2],
    light_count: u32,
    padding: u32,
    ambient: [f32; 4],
    lights: [LightData; MAX_LIGHTS],
}

/// Textured quads lit by the scene's lights through a normal map.
///
/// Objects provide their normal map through [`Renderable::normal_map`];
/// without one a flat normal is used. With no lights in range the pass
/// is ambient only.
#[derive(Debug)]
pub struct Light2DPipeline {
    batch: VertexBatch,
    uniforms: LightUniforms,
    default_normal: Option<TextureHandle>,
}

impl Light2DPipeline {
    pub fn new<G: GlContext>(core: &mut RenderCore<G>) -> Result<Self> {
        let quads = core.config().batch_size;
        let batch = VertexBatch::new(core, LIGHT_VERTEX_SHADER, LIGHT_FRAGMENT_SHADER, quads)?;
        let (width, height) = core.logical_size();
        let mut pipeline = Self {
            batch,
            uniforms: LightUniforms {
                projection: projection(width, height).to_cols_array_2d(),
                resolution: [core.width() as f32, core.height() as f32],
                light_count: 0,
                padding: 0,
                ambient: Color::WHITE.to_array(),
                lights: [LightData::default(); MAX_LIGHTS],
            },
            default_normal: None,
        };
        pipeline.upload();
        Ok(pipeline)
    }

    fn upload(&mut self) {
        self.batch.set_uniforms(bytemuck::bytes_of(&self.uniforms));
    }

    /// Number of lights uploaded for the current camera pass.
    pub fn light_count(&self) -> usize {
        self.uniforms.light_count as usize
    }

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
}

impl<G: GlContext> Pipeline<G> for Light2DPipeline {
    fn program(&self) -> ProgramHandle {
        self.batch.program()
    }

    fn vertex_buffer(&self) -> BufferHandle {
        self.batch.vertex_buffer()
    }

    fn boot(&mut self, core: &mut RenderCore<G>) -> Result<()> {
        let mut desc = TextureDescriptor::new(1, 1).with_pixels(&DEFAULT_NORMAL);
        desc.premultiply_alpha = false;
        self.default_normal = Some(core.create_texture_2d(desc)?);
        Ok(())
    }

    fn bind(&mut self, core: &mut RenderCore<G>) {
        self.batch.bind(core);
    }

    fn on_bind(&mut self, core: &mut RenderCore<G>, object: Option<&dyn Renderable<G>>) {
        let normal = object.and_then(|o| o.normal_map()).or(self.default_normal);
        if let Some(normal) = normal {
            self.batch.bind_texture(core, normal, NORMAL_MAP_UNIT);
        }
    }

    fn flush(&mut self, core: &mut RenderCore<G>) {
        self.batch.flush(core);
    }

    fn resize(&mut self, width: f32, height: f32, resolution: f32) {
        self.uniforms.projection = projection(width, height).to_cols_array_2d();
        self.uniforms.resolution = [(width * resolution).floor(), (height * resolution).floor()];
        self.upload();
    }

    fn on_render(&mut self, core: &mut RenderCore<G>, scene: &Scene, camera: &Camera) {
        self.batch.flush(core);

        let manager = &scene.lights;
        let resolution = core.resolution();
        let zoom = if camera.zoom > 0.0 { camera.zoom } else { 1.0 };

        self.uniforms.lights = [LightData::default(); MAX_LIGHTS];
        let culled = if manager.is_active() { manager.cull(camera, MAX_LIGHTS) } else { Vec::new() };
        for (slot, light) in self.uniforms.lights.iter_mut().zip(&culled) {
            let screen = camera.world_to_screen(light.position) * resolution;
            *slot = LightData {
                position: screen.to_array(),
                radius: light.radius * zoom * resolution,
                intensity: light.intensity,
                color: light.color.to_array(),
            };
        }
        self.uniforms.light_count = culled.len() as u32;
        self.uniforms.ambient = if manager.is_active() {
            manager.ambient_color.to_array()
        } else {
            Color::WHITE.to_array()
        };
        self.upload();
    }

    fn destroy(&mut self, core: &mut RenderCore<G>) {
        self.batch.destroy(core);
        if let Some(normal) = self.default_normal.take() {
            core.delete_texture(normal);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::context::{GlCall, HeadlessContext};
    use crate::renderer::test_support::headless;
    use crate::renderer::Renderer;
    use crate::scene::Light;

    struct Lit {
        texture: TextureHandle,
        normal: Option<TextureHandle>,
    }

    impl Renderable<HeadlessContext> for Lit {
        fn normal_map(&self) -> Option<TextureHandle> {
            self.normal
        }

        fn render_gl(&self, renderer: &mut Renderer<HeadlessContext>, _interpolation: f32, _camera: &Camera) {
            let id = renderer.default_pipelines().light;
            renderer.with_pipeline::<Light2DPipeline, _>(id, Some(self), |p, core| {
                p.batch_rect(core, self.texture, Rect::new(0.0, 0.0, 8.0, 8.0), Color::WHITE)
            });
        }
    }

    #[test]
    fn uniform_block_matches_the_shader_layout() {
        assert_eq!(size_of::<LightData>(), 32);
        assert_eq!(size_of::<LightUniforms>(), 96 + 32 * MAX_LIGHTS);
    }

    #[test]
    fn lights_in_view_are_uploaded_per_camera() {
        let mut r = headless(64, 64);
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let mut scene = Scene::default();
        scene.lights.enable();
        scene.lights.add_light(Light::new(Vec2::new(32.0, 32.0), 20.0, Color::WHITE, 1.0));
        scene.lights.add_light(Light::new(Vec2::new(5000.0, 0.0), 20.0, Color::WHITE, 1.0));
        let object = Lit { texture, normal: None };

        r.pre_render().unwrap();
        r.render(&scene, &[&object], 0.0, &Camera::new(0.0, 0.0, 64.0, 64.0));
        r.post_render().unwrap();

        let id = r.default_pipelines().light;
        assert_eq!(r.pipeline_mut::<Light2DPipeline>(id).unwrap().light_count(), 1);
        let gl = r.context();
        assert!(gl.calls().contains(&GlCall::UniformBlock(size_of::<LightUniforms>())));
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 1);
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn object_normal_map_replaces_the_default_on_unit_one() {
        let mut r = headless(32, 32);
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let normal = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();

        let flat = Lit { texture, normal: None };
        flat.render_gl(&mut r, 0.0, &Camera::new(0.0, 0.0, 32.0, 32.0));
        let default_normal = r.state().texture(NORMAL_MAP_UNIT);
        assert!(default_normal.is_some());

        let bumpy = Lit { texture, normal: Some(normal) };
        bumpy.render_gl(&mut r, 0.0, &Camera::new(0.0, 0.0, 32.0, 32.0));
        assert_eq!(r.state().texture(NORMAL_MAP_UNIT), Some(normal));
        // Switching normal maps flushed the first quad.
        assert_eq!(r.context().count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 1);
    }

    #[test]
    fn inactive_manager_lights_nothing() {
        let mut r = headless(32, 32);
        let mut scene = Scene::default();
        scene.lights.add_light(Light::new(Vec2::new(16.0, 16.0), 20.0, Color::WHITE, 1.0));

        r.pre_render().unwrap();
        r.render(&scene, &[], 0.0, &Camera::new(0.0, 0.0, 32.0, 32.0));
        r.post_render().unwrap();

        let id = r.default_pipelines().light;
        assert_eq!(r.pipeline_mut::<Light2DPipeline>(id).unwrap().light_count(), 0);
    }
}
