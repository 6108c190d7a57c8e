//! Per-frame sequence: `pre_render`, one `render` per camera, `post_render`.

use super::Renderer;
use crate::blend::BlendModeId;
use crate::context::{ClearFlags, GlContext};
use crate::error::{RenderError, Result};
use crate::pipeline::{FlatTintPipeline, Renderable};
use crate::scene::{Camera, Scene};

impl<G: GlContext> Renderer<G> {
    /// Starts a frame: acquires the drawing buffer, clears it to the
    /// background color (when configured) and runs every pipeline's
    /// `on_pre_render`.
    ///
    /// A context without a frame available skips the whole frame.
    pub fn pre_render(&mut self) -> Result<()> {
        self.poll_context();
        if !self.core.is_active() {
            return Ok(());
        }

        match self.core.gl.begin_frame() {
            Ok(true) => self.frame_open = true,
            Ok(false) => {
                self.frame_open = false;
                log::trace!("no frame available; skipping");
                return Ok(());
            }
            Err(RenderError::ContextLost) => {
                self.context_lost();
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let background = self.core.config.background_color;
        let gl = &mut self.core.gl;
        gl.clear_color(background.premultiplied().to_array());
        if self.core.config.clear_before_render {
            gl.clear(ClearFlags::ALL);
        }

        let Self { core, pipelines, .. } = self;
        pipelines.for_each(|p| p.on_pre_render(core));
        Ok(())
    }

    /// Renders `children` (already depth sorted) through `camera`.
    pub fn render(
        &mut self,
        scene: &Scene,
        children: &[&dyn Renderable<G>],
        interpolation: f32,
        camera: &Camera,
    ) {
        if !self.frame_open || !self.core.is_active() {
            return;
        }

        {
            let Self { core, pipelines, .. } = self;
            pipelines.for_each(|p| p.on_render(core, scene, camera));
        }

        let viewport = camera.viewport();
        let resolution = self.core.config.resolution;
        self.push_scissor(viewport.to_device(resolution));

        let flat = self.defaults.flat_tint;
        if !camera.background_color.is_transparent() {
            self.with_pipeline::<FlatTintPipeline, _>(flat, None, |p, core| {
                p.batch_fill_rect(core, viewport, camera.background_color);
                p.flush_batch(core);
            });
        }

        for child in children {
            if !child.will_render(camera) {
                continue;
            }

            self.set_blend_mode(child.blend_mode());

            let mask = child.mask();
            if let Some(mask) = mask {
                mask.pre_render_gl(self, *child, camera);
            }
            child.render_gl(self, interpolation, camera);
            if let Some(mask) = mask {
                mask.post_render_gl(self, *child);
            }
        }

        self.flush();
        self.set_blend_mode(BlendModeId::NORMAL);

        let overlays: Vec<_> = [camera.fade, camera.flash]
            .into_iter()
            .filter(|effect| effect.is_visible())
            .collect();
        if !overlays.is_empty() {
            self.with_pipeline::<FlatTintPipeline, _>(flat, None, |p, core| {
                for effect in overlays {
                    p.batch_fill_rect(core, viewport, effect.overlay_color());
                }
                p.flush_batch(core);
            });
        }

        self.pop_scissor();
    }

    /// Ends the frame: delivers a pending snapshot, runs every pipeline's
    /// `on_post_render` and presents.
    pub fn post_render(&mut self) -> Result<()> {
        if !self.frame_open || !self.core.is_active() {
            return Ok(());
        }

        if let Some(request) = self.snapshot.take() {
            self.flush();
            self.deliver_snapshot(request);
        }

        {
            let Self { core, pipelines, .. } = self;
            pipelines.for_each(|p| p.on_post_render(core));
        }

        debug_assert_eq!(self.core.scissor.depth(), 0, "unbalanced scissor push/pop in frame");
        self.core.gl.end_frame();
        self.frame_open = false;
        Ok(())
    }

    /// `true` between a `pre_render` that acquired a frame and its
    /// `post_render`.
    pub fn frame_open(&self) -> bool {
        self.frame_open
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::color::Color;
    use crate::context::{Capability, GlCall, Topology};
    use crate::geom::{DeviceRect, Rect};
    use crate::pipeline::TextureTintPipeline;
    use crate::renderer::test_support::headless;
    use crate::renderer::RenderCore;
    use crate::resources::{TextureDescriptor, TextureHandle};
    use crate::scene::CameraEffect;
    use crate::context::HeadlessContext;

    struct Quad {
        texture: TextureHandle,
        rect: Rect,
        blend: BlendModeId,
        visible: bool,
        rendered: RefCell<u32>,
    }

    impl Quad {
        fn new(texture: TextureHandle, blend: BlendModeId) -> Self {
            Self {
                texture,
                rect: Rect::new(0.0, 0.0, 8.0, 8.0),
                blend,
                visible: true,
                rendered: RefCell::new(0),
            }
        }
    }

    impl Renderable<HeadlessContext> for Quad {
        fn will_render(&self, _camera: &Camera) -> bool {
            self.visible
        }

        fn blend_mode(&self) -> BlendModeId {
            self.blend
        }

        fn render_gl(&self, renderer: &mut Renderer<HeadlessContext>, _interpolation: f32, _camera: &Camera) {
            *self.rendered.borrow_mut() += 1;
            let id = renderer.default_pipelines().texture_tint;
            renderer.with_pipeline::<TextureTintPipeline, _>(
                id,
                Some(self),
                |p, core: &mut RenderCore<HeadlessContext>| p.batch_rect(core, self.texture, self.rect, Color::WHITE),
            );
        }
    }

    fn camera(width: f32, height: f32) -> Camera {
        Camera::new(0.0, 0.0, width, height)
    }

    #[test]
    fn empty_camera_pushes_and_pops_scissor_without_drawing() {
        let mut r = headless(64, 64);
        let scene = Scene::default();
        let cam = Camera::new(8.0, 8.0, 32.0, 32.0);

        r.pre_render().unwrap();
        r.context_mut().clear_calls();
        r.render(&scene, &[], 0.0, &cam);

        let gl = r.context();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 0);
        assert!(gl.calls().contains(&GlCall::Scissor(8, 24, 32, 32)));
        assert_eq!(gl.calls().last(), Some(&GlCall::Disable(Capability::ScissorTest)));
        assert_eq!(r.scissor().depth(), 0);
        r.post_render().unwrap();
    }

    #[test]
    fn frame_draws_children_in_order_and_presents() {
        let mut r = headless(64, 64);
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let a = Quad::new(texture, BlendModeId::NORMAL);
        let b = Quad::new(texture, BlendModeId::ADD);
        let mut hidden = Quad::new(texture, BlendModeId::NORMAL);
        hidden.visible = false;

        r.pre_render().unwrap();
        r.render(&Scene::default(), &[&a, &b, &hidden], 0.0, &camera(64.0, 64.0));
        r.post_render().unwrap();

        assert_eq!(*a.rendered.borrow(), 1);
        assert_eq!(*b.rendered.borrow(), 1);
        assert_eq!(*hidden.rendered.borrow(), 0);

        let gl = r.context();
        // One draw for `a` flushed by the ADD switch, one for `b`.
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { topology: Topology::Triangles, .. })), 2);
        assert_eq!(gl.calls().last(), Some(&GlCall::EndFrame));
        assert_eq!(r.state().blend_mode(), Some(BlendModeId::NORMAL));
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn texture_sequence_a_b_a_flushes_at_each_transition() {
        let mut r = headless(64, 64);
        let tex_a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let tex_b = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let raw_a = r.core().texture(tex_a).unwrap().raw;
        let raw_b = r.core().texture(tex_b).unwrap().raw;
        let (first, second, third) = (
            Quad::new(tex_a, BlendModeId::NORMAL),
            Quad::new(tex_b, BlendModeId::NORMAL),
            Quad::new(tex_a, BlendModeId::NORMAL),
        );

        r.pre_render().unwrap();
        r.context_mut().clear_calls();
        r.render(&Scene::default(), &[&first, &second, &third], 0.0, &camera(64.0, 64.0));

        let gl = r.context();
        let binds: Vec<_> = gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::BindTexture(Some(id)) if *id == raw_a || *id == raw_b => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![raw_a, raw_b, raw_a]);

        // A→B and B→A each flush one quad; the end of the camera pass flushes the last.
        let draws: Vec<u32> = gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::DrawArrays { count, .. } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![6, 6, 6]);
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
        r.post_render().unwrap();
    }

    #[test]
    fn background_and_overlays_use_the_flat_pipeline() {
        let mut r = headless(64, 64);
        let mut cam = camera(64.0, 64.0);
        cam.background_color = Color::from_hex(0x336699);
        cam.flash = CameraEffect { active: true, color: Color::WHITE, alpha: 0.5 };

        r.pre_render().unwrap();
        r.context_mut().clear_calls();
        r.render(&Scene::default(), &[], 0.0, &cam);

        let gl = r.context();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 2);
        assert_eq!(r.current_pipeline(), Some(r.default_pipelines().flat_tint));
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn unavailable_frame_skips_render_and_present() {
        let mut r = headless(32, 32);
        r.context_mut().set_frame_available(false);
        r.context_mut().clear_calls();

        r.pre_render().unwrap();
        r.render(&Scene::default(), &[], 0.0, &camera(32.0, 32.0));
        r.post_render().unwrap();

        assert_eq!(r.context().calls(), &[GlCall::BeginFrame]);
    }

    #[test]
    fn clear_before_render_clears_everything() {
        let mut r = headless(32, 32);
        r.context_mut().clear_calls();
        r.pre_render().unwrap();
        assert!(r.context().calls().contains(&GlCall::Clear(ClearFlags::ALL)));
        assert_eq!(r.scissor().current(), DeviceRect::full(32, 32));
    }
}
