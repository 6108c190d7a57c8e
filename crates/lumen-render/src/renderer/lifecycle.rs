//! Context lifecycle: `Active → Lost → Active`, and terminal `Destroyed`.
//!
//! Restoration re-runs the same init routine as construction, so every
//! GPU-dependent part of the renderer is rebuilt in place.

use super::Renderer;
use crate::blend::BlendModeId;
use crate::context::{Capability, GlContext};
use crate::error::{RenderError, Result};
use crate::pipeline::{self, PipelineRegistry};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContextState {
    Active,
    /// Every GPU object is gone; rendering is suspended until restore.
    Lost,
    Destroyed,
}

/// Callback run on context loss or restoration.
pub type LifecycleCallback<G> = Box<dyn FnMut(&mut Renderer<G>)>;

impl<G: GlContext> Renderer<G> {
    /// Sets default GL state and (re)creates the blank texture and default
    /// pipelines. Shared by construction and restoration.
    pub(super) fn init(&mut self) -> Result<()> {
        self.core.reset_state();

        let gl = &mut self.core.gl;
        gl.set_capability(Capability::DepthTest, false);
        gl.set_capability(Capability::CullFace, false);
        gl.set_capability(Capability::Blend, true);
        gl.clear_color(self.core.config.background_color.premultiplied().to_array());

        self.core.create_blank_texture()?;

        self.pipelines = PipelineRegistry::new();
        self.defaults = pipeline::register_defaults(&mut self.core, &mut self.pipelines)?;
        self.pipelines.boot_all(&mut self.core)?;

        self.set_blend_mode(BlendModeId::NORMAL);

        let config = &self.core.config;
        let (width, height, resolution) = (config.width, config.height, config.resolution);
        self.resize_with_resolution(width, height, resolution);

        log::debug!("renderer initialized ({} pipelines)", self.pipelines.len());
        Ok(())
    }

    pub fn context_state(&self) -> ContextState {
        self.core.context_state
    }

    pub fn is_context_lost(&self) -> bool {
        self.core.context_state == ContextState::Lost
    }

    /// Marks the context lost and runs the lost callbacks. Nothing touches
    /// the context until [`Renderer::context_restored`] succeeds.
    pub fn context_lost(&mut self) {
        if self.core.context_state != ContextState::Active {
            return;
        }
        log::warn!("GPU context lost; rendering suspended");
        self.core.context_state = ContextState::Lost;
        self.frame_open = false;

        let mut callbacks = std::mem::take(&mut self.lost_callbacks);
        for cb in &mut callbacks {
            cb(self);
        }
        callbacks.append(&mut self.lost_callbacks);
        self.lost_callbacks = callbacks;
    }

    /// Re-acquires the context and rebuilds every GPU-dependent component.
    ///
    /// Every handle issued before the loss is stale afterwards. On failure
    /// the renderer stays lost.
    pub fn context_restored(&mut self) -> Result<()> {
        match self.core.context_state {
            ContextState::Active => return Ok(()),
            ContextState::Destroyed => {
                return Err(RenderError::ContextUnavailable("renderer destroyed".into()));
            }
            ContextState::Lost => {}
        }

        self.core.gl.restore()?;
        self.core.invalidate_resources();
        self.pipelines = PipelineRegistry::new();

        self.core.context_state = ContextState::Active;
        if let Err(err) = self.init() {
            log::error!("renderer re-initialization failed: {err}");
            self.core.context_state = ContextState::Lost;
            return Err(err);
        }
        log::info!("GPU context restored");

        let mut callbacks = std::mem::take(&mut self.restored_callbacks);
        for cb in &mut callbacks {
            cb(self);
        }
        callbacks.append(&mut self.restored_callbacks);
        self.restored_callbacks = callbacks;
        Ok(())
    }

    pub fn on_context_lost(&mut self, callback: impl FnMut(&mut Renderer<G>) + 'static) {
        self.lost_callbacks.push(Box::new(callback));
    }

    pub fn on_context_restored(&mut self, callback: impl FnMut(&mut Renderer<G>) + 'static) {
        self.restored_callbacks.push(Box::new(callback));
    }

    /// Detects a loss the context reported on its own.
    pub(super) fn poll_context(&mut self) {
        if self.core.context_state == ContextState::Active && self.core.gl.is_context_lost() {
            self.context_lost();
        }
    }

    /// Destroys every pipeline and GPU resource. Terminal.
    pub fn destroy(&mut self) {
        if self.core.context_state == ContextState::Destroyed {
            return;
        }
        self.flush();
        {
            let Self { core, pipelines, .. } = self;
            pipelines.destroy_all(core);
        }
        self.core.delete_all_resources();
        self.core.context_state = ContextState::Destroyed;
        self.lost_callbacks.clear();
        self.restored_callbacks.clear();
        self.snapshot = None;
        self.frame_open = false;
        log::debug!("renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::pipeline::{BITMAP_MASK_PIPELINE, FLAT_TINT_PIPELINE, LIGHT_PIPELINE, TEXTURE_TINT_PIPELINE};
    use crate::renderer::test_support::headless;
    use crate::resources::TextureDescriptor;

    #[test]
    fn lost_then_restored_rebuilds_defaults() {
        let mut r = headless(64, 48);
        let lost = Rc::new(Cell::new(0));
        let restored = Rc::new(Cell::new(0));
        {
            let lost = Rc::clone(&lost);
            r.on_context_lost(move |_| lost.set(lost.get() + 1));
            let restored = Rc::clone(&restored);
            r.on_context_restored(move |_| restored.set(restored.get() + 1));
        }
        let texture = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        r.set_blend_mode(BlendModeId::SCREEN);

        r.context_mut().lose_context();
        r.context_lost();
        assert!(r.is_context_lost());
        assert_eq!(lost.get(), 1);

        r.context_restored().unwrap();
        assert!(!r.is_context_lost());
        assert_eq!(restored.get(), 1);
        assert_eq!(r.state().blend_mode(), Some(BlendModeId::NORMAL));
        for name in [TEXTURE_TINT_PIPELINE, FLAT_TINT_PIPELINE, BITMAP_MASK_PIPELINE, LIGHT_PIPELINE] {
            assert!(r.has_pipeline(name), "{name} missing after restore");
        }
        assert!(r.texture(texture).is_none(), "pre-loss handles must be stale");
        assert!(r.blank_texture().is_some());
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn lost_renderer_never_touches_the_context() {
        let mut r = headless(32, 32);
        r.context_lost();
        r.context_mut().clear_calls();

        r.set_blend_mode(BlendModeId::ADD);
        r.set_texture_2d(None, 3);
        assert!(r.create_texture_2d(TextureDescriptor::new(2, 2)).is_err());
        r.pre_render().unwrap();
        r.post_render().unwrap();

        assert!(r.context().calls().is_empty(), "{:?}", r.context().calls());
    }

    #[test]
    fn loss_reported_by_the_context_is_detected_in_pre_render() {
        let mut r = headless(32, 32);
        r.context_mut().lose_context();
        r.pre_render().unwrap();
        assert_eq!(r.context_state(), ContextState::Lost);
    }

    #[test]
    fn restore_while_active_is_a_no_op() {
        let mut r = headless(32, 32);
        r.context_mut().clear_calls();
        r.context_restored().unwrap();
        assert!(r.context().calls().is_empty());
    }

    #[test]
    fn destroy_releases_everything_and_is_terminal() {
        let mut r = headless(32, 32);
        r.create_texture_2d(TextureDescriptor::new(2, 2)).unwrap();
        r.destroy();

        let gl = r.context();
        assert_eq!(gl.live_textures(), 0);
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(r.context_state(), ContextState::Destroyed);
        assert!(r.context_restored().is_err());

        r.context_mut().clear_calls();
        r.destroy();
        assert!(r.context().calls().is_empty());
    }
}
