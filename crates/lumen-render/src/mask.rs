//! Masks bracket a renderable's draw with a pre and a post hook.

use std::cell::Cell;

use crate::color::Color;
use crate::context::GlContext;
use crate::error::Result;
use crate::pipeline::{BitmapMaskPipeline, Renderable};
use crate::renderer::Renderer;
use crate::resources::{FramebufferHandle, TextureDescriptor, TextureHandle};
use crate::scene::Camera;

pub trait Mask<G: GlContext> {
    /// Runs before `object` renders.
    fn pre_render_gl(&self, renderer: &mut Renderer<G>, object: &dyn Renderable<G>, camera: &Camera);

    /// Runs after `object` rendered.
    fn post_render_gl(&self, renderer: &mut Renderer<G>, object: &dyn Renderable<G>);
}

/// Masks an object by the alpha of another renderable.
///
/// The mask source renders into one render target, the masked object into
/// a second, and [`BitmapMaskPipeline`] composites the two into whatever
/// framebuffer was bound before. Both targets are drawing-buffer sized.
///
/// The render targets belong to the renderer's context: after a context
/// loss the mask has to be rebuilt.
pub struct BitmapMask<G: GlContext> {
    source: Box<dyn Renderable<G>>,
    main_texture: TextureHandle,
    main_framebuffer: FramebufferHandle,
    mask_texture: TextureHandle,
    mask_framebuffer: FramebufferHandle,
    pub invert_alpha: bool,
    /// Framebuffer to composite into, captured by `pre_render_gl`.
    previous: Cell<Option<FramebufferHandle>>,
}

impl<G: GlContext> BitmapMask<G> {
    pub fn new(renderer: &mut Renderer<G>, source: Box<dyn Renderable<G>>) -> Result<Self> {
        let (width, height) = (renderer.width(), renderer.height());
        let (main_texture, main_framebuffer) = Self::render_target(renderer, width, height)?;
        let (mask_texture, mask_framebuffer) = match Self::render_target(renderer, width, height) {
            Ok(target) => target,
            Err(err) => {
                renderer.delete_framebuffer(main_framebuffer);
                renderer.delete_texture(main_texture);
                return Err(err);
            }
        };

        Ok(Self {
            source,
            main_texture,
            main_framebuffer,
            mask_texture,
            mask_framebuffer,
            invert_alpha: false,
            previous: Cell::new(None),
        })
    }

    fn render_target(
        renderer: &mut Renderer<G>,
        width: u32,
        height: u32,
    ) -> Result<(TextureHandle, FramebufferHandle)> {
        let texture = renderer.create_texture_2d(TextureDescriptor::new(width, height))?;
        match renderer.create_framebuffer(width, height, texture, false) {
            Ok(framebuffer) => Ok((texture, framebuffer)),
            Err(err) => {
                renderer.delete_texture(texture);
                Err(err)
            }
        }
    }

    pub fn source(&self) -> &dyn Renderable<G> {
        self.source.as_ref()
    }

    /// Releases both render targets.
    pub fn destroy(self, renderer: &mut Renderer<G>) {
        renderer.delete_framebuffer(self.main_framebuffer);
        renderer.delete_framebuffer(self.mask_framebuffer);
        renderer.delete_texture(self.main_texture);
        renderer.delete_texture(self.mask_texture);
    }
}

impl<G: GlContext> Mask<G> for BitmapMask<G> {
    fn pre_render_gl(&self, renderer: &mut Renderer<G>, _object: &dyn Renderable<G>, camera: &Camera) {
        renderer.flush();
        self.previous.set(renderer.state().framebuffer());

        renderer.set_framebuffer(Some(self.mask_framebuffer));
        renderer.clear(Color::transparent());
        self.source.render_gl(renderer, 0.0, camera);
        renderer.flush();

        renderer.set_framebuffer(Some(self.main_framebuffer));
        renderer.clear(Color::transparent());
    }

    fn post_render_gl(&self, renderer: &mut Renderer<G>, _object: &dyn Renderable<G>) {
        renderer.flush();
        renderer.set_framebuffer(self.previous.take());

        let id = renderer.default_pipelines().bitmap_mask;
        let (main, mask, invert) = (self.main_texture, self.mask_texture, self.invert_alpha);
        renderer.with_pipeline::<BitmapMaskPipeline, _>(id, None, |p, core| {
            p.draw_mask(core, main, mask, invert)
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::context::{GlCall, HeadlessContext};
    use crate::geom::Rect;
    use crate::pipeline::TextureTintPipeline;
    use crate::renderer::test_support::headless;
    use crate::scene::Scene;

    struct Sprite {
        texture: TextureHandle,
        log: Rc<RefCell<Vec<Option<FramebufferHandle>>>>,
        mask: Option<BitmapMask<HeadlessContext>>,
    }

    impl Renderable<HeadlessContext> for Sprite {
        fn mask(&self) -> Option<&dyn Mask<HeadlessContext>> {
            self.mask.as_ref().map(|m| m as &dyn Mask<HeadlessContext>)
        }

        fn render_gl(&self, renderer: &mut Renderer<HeadlessContext>, _interpolation: f32, _camera: &Camera) {
            self.log.borrow_mut().push(renderer.state().framebuffer());
            let id = renderer.default_pipelines().texture_tint;
            renderer.with_pipeline::<TextureTintPipeline, _>(id, Some(self), |p, core| {
                p.batch_rect(core, self.texture, Rect::new(0.0, 0.0, 4.0, 4.0), Color::WHITE)
            });
        }
    }

    #[test]
    fn masked_object_renders_offscreen_and_is_composited_back() {
        let mut r = headless(16, 16);
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let source = Sprite { texture, log: Rc::clone(&log), mask: None };
        let mask = BitmapMask::new(&mut r, Box::new(source)).unwrap();
        let (mask_fb, main_fb) = (mask.mask_framebuffer, mask.main_framebuffer);
        let object = Sprite { texture, log: Rc::clone(&log), mask: Some(mask) };

        r.pre_render().unwrap();
        r.context_mut().clear_calls();
        r.render(&Scene::default(), &[&object], 0.0, &Camera::new(0.0, 0.0, 16.0, 16.0));
        r.post_render().unwrap();

        assert_eq!(*log.borrow(), vec![Some(mask_fb), Some(main_fb)]);
        assert_eq!(r.state().framebuffer(), None);

        let gl = r.context();
        // Mask source, masked object, composite.
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 3);
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());
    }

    #[test]
    fn destroy_releases_both_targets() {
        let mut r = headless(16, 16);
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let before = r.context().live_framebuffers();
        let source = Sprite { texture, log: Rc::default(), mask: None };
        let mask = BitmapMask::new(&mut r, Box::new(source)).unwrap();
        assert_eq!(r.context().live_framebuffers(), before + 2);

        mask.destroy(&mut r);
        assert_eq!(r.context().live_framebuffers(), before);
    }
}
