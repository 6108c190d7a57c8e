//! Cached binding state and the idempotent setters over it.
//!
//! Every setter compares against the cache first; only a real change
//! flushes pending geometry (strictly before the new binding is issued),
//! makes the GPU call and updates the cache.

use super::{RenderCore, Renderer};
use crate::blend::{BlendFunc, BlendModeId};
use crate::context::{BufferTarget, Capability, GlContext};
use crate::resources::{BufferHandle, FramebufferHandle, ProgramHandle, TextureHandle};

/// What the renderer believes is bound on the context.
///
/// `blend_mode == None` means unknown (fresh or reset context), so the next
/// `set_blend_mode` always applies.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    active_texture_unit: usize,
    textures: Vec<Option<TextureHandle>>,
    framebuffer: Option<FramebufferHandle>,
    program: Option<ProgramHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    blend_mode: Option<BlendModeId>,
}

impl RenderState {
    pub(crate) fn new(texture_units: usize) -> Self {
        Self {
            active_texture_unit: 0,
            textures: vec![None; texture_units],
            framebuffer: None,
            program: None,
            vertex_buffer: None,
            index_buffer: None,
            blend_mode: None,
        }
    }

    pub fn active_texture_unit(&self) -> usize {
        self.active_texture_unit
    }

    /// Texture bound on `unit`; `None` for unbound or out-of-range units.
    pub fn texture(&self, unit: usize) -> Option<TextureHandle> {
        self.textures.get(unit).copied().flatten()
    }

    pub fn texture_units(&self) -> usize {
        self.textures.len()
    }

    pub fn framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn blend_mode(&self) -> Option<BlendModeId> {
        self.blend_mode
    }

    pub(crate) fn forget_texture(&mut self, texture: TextureHandle) {
        for slot in &mut self.textures {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    pub(crate) fn forget_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    pub(crate) fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    pub(crate) fn forget_buffer(&mut self, buffer: BufferHandle) {
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        if self.index_buffer == Some(buffer) {
            self.index_buffer = None;
        }
    }
}

impl<G: GlContext> RenderCore<G> {
    /// Binds `texture` on `unit`. Returns `true` when the binding changed.
    pub fn set_texture_2d(
        &mut self,
        texture: Option<TextureHandle>,
        unit: usize,
        flush: impl FnOnce(&mut Self),
    ) -> bool {
        if !self.is_active() || self.state.texture(unit) == texture {
            return false;
        }
        if unit >= self.state.textures.len() {
            log::warn!("texture unit {unit} out of range ({} units)", self.state.textures.len());
            return false;
        }
        let raw = match texture {
            None => None,
            Some(handle) => match self.textures.get(handle) {
                Some(t) => Some(t.raw),
                None => {
                    log::warn!("set_texture_2d with stale handle {handle:?}");
                    return false;
                }
            },
        };

        flush(self);

        if self.state.active_texture_unit != unit {
            self.gl.active_texture(unit);
            self.state.active_texture_unit = unit;
        }
        self.gl.bind_texture(raw);
        self.state.textures[unit] = texture;
        true
    }

    /// Binds `framebuffer`; `None` is the default framebuffer.
    pub fn set_framebuffer(
        &mut self,
        framebuffer: Option<FramebufferHandle>,
        flush: impl FnOnce(&mut Self),
    ) -> bool {
        if !self.is_active() || self.state.framebuffer == framebuffer {
            return false;
        }
        let raw = match framebuffer {
            None => None,
            Some(handle) => match self.framebuffers.get(handle) {
                Some(fb) => Some(fb.raw),
                None => {
                    log::warn!("set_framebuffer with stale handle {handle:?}");
                    return false;
                }
            },
        };

        flush(self);
        self.gl.bind_framebuffer(raw);
        self.state.framebuffer = framebuffer;
        true
    }

    pub fn set_program(&mut self, program: Option<ProgramHandle>, flush: impl FnOnce(&mut Self)) -> bool {
        if !self.is_active() || self.state.program == program {
            return false;
        }
        let raw = match program {
            None => None,
            Some(handle) => match self.programs.get(handle) {
                Some(p) => Some(p.raw),
                None => {
                    log::warn!("set_program with stale handle {handle:?}");
                    return false;
                }
            },
        };

        flush(self);
        self.gl.use_program(raw);
        self.state.program = program;
        true
    }

    pub fn set_vertex_buffer(
        &mut self,
        buffer: Option<BufferHandle>,
        flush: impl FnOnce(&mut Self),
    ) -> bool {
        self.set_buffer(BufferTarget::Vertex, buffer, flush)
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: Option<BufferHandle>,
        flush: impl FnOnce(&mut Self),
    ) -> bool {
        self.set_buffer(BufferTarget::Index, buffer, flush)
    }

    fn set_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<BufferHandle>,
        flush: impl FnOnce(&mut Self),
    ) -> bool {
        let cached = match target {
            BufferTarget::Vertex => self.state.vertex_buffer,
            BufferTarget::Index => self.state.index_buffer,
        };
        if !self.is_active() || cached == buffer {
            return false;
        }
        let raw = match buffer {
            None => None,
            Some(handle) => match self.buffers.get(handle) {
                Some(b) => Some(b.raw),
                None => {
                    log::warn!("set {target:?} buffer with stale handle {handle:?}");
                    return false;
                }
            },
        };

        flush(self);
        self.gl.bind_buffer(target, raw);
        match target {
            BufferTarget::Vertex => self.state.vertex_buffer = buffer,
            BufferTarget::Index => self.state.index_buffer = buffer,
        }
        true
    }

    /// Applies blend mode `id`. [`BlendModeId::SKIP_CHECK`] never changes
    /// anything; ids without parameters blend as NORMAL.
    pub fn set_blend_mode(&mut self, id: BlendModeId, flush: impl FnOnce(&mut Self)) -> bool {
        if id == BlendModeId::SKIP_CHECK || !self.is_active() || self.state.blend_mode == Some(id) {
            return false;
        }

        flush(self);

        let params = self.blend_modes.get(id);
        self.gl.set_capability(Capability::Blend, true);

        let (color, alpha) = params.equation;
        if color == alpha {
            self.gl.blend_equation(color);
        } else {
            self.gl.blend_equation_separate(color, alpha);
        }

        match params.func {
            BlendFunc::Combined(src, dst) => self.gl.blend_func(src, dst),
            BlendFunc::Separate { src_rgb, dst_rgb, src_alpha, dst_alpha } => {
                self.gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha)
            }
        }

        self.state.blend_mode = Some(id);
        true
    }

    /// Forgets every cached binding. The next setter of each kind always
    /// reaches the context.
    pub(crate) fn reset_state(&mut self) {
        self.state = RenderState::new(self.gl.max_texture_units());
        self.scissor.reset(self.width, self.height);
    }
}

impl<G: GlContext> Renderer<G> {
    pub fn set_texture_2d(&mut self, texture: Option<TextureHandle>, unit: usize) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_texture_2d(texture, unit, |core| pipelines.flush_current(core))
    }

    pub fn set_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_framebuffer(framebuffer, |core| pipelines.flush_current(core))
    }

    pub fn set_program(&mut self, program: Option<ProgramHandle>) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_program(program, |core| pipelines.flush_current(core))
    }

    pub fn set_vertex_buffer(&mut self, buffer: Option<BufferHandle>) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_vertex_buffer(buffer, |core| pipelines.flush_current(core))
    }

    pub fn set_index_buffer(&mut self, buffer: Option<BufferHandle>) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_index_buffer(buffer, |core| pipelines.flush_current(core))
    }

    pub fn set_blend_mode(&mut self, id: BlendModeId) -> bool {
        let Self { core, pipelines, .. } = self;
        core.set_blend_mode(id, |core| pipelines.flush_current(core))
    }

    /// Appends a custom blend mode and returns its id.
    pub fn add_blend_mode(&mut self, params: crate::blend::BlendParams) -> BlendModeId {
        self.core.blend_modes.add(params)
    }

    /// Replaces a custom blend mode. When it is the current mode the new
    /// parameters are applied immediately.
    pub fn update_blend_mode(&mut self, id: BlendModeId, params: crate::blend::BlendParams) -> bool {
        if !self.core.blend_modes.update(id, params) {
            return false;
        }
        if self.core.state.blend_mode == Some(id) {
            self.flush();
            self.core.state.blend_mode = None;
            self.set_blend_mode(id);
        }
        true
    }

    pub fn remove_blend_mode(&mut self, id: BlendModeId) -> bool {
        if !self.core.blend_modes.remove(id) {
            return false;
        }
        if self.core.state.blend_mode == Some(id) {
            self.set_blend_mode(BlendModeId::NORMAL);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::blend::BlendModeId;
    use crate::context::{BlendEquation, BlendFactor, BufferTarget, BufferUsage, Capability, GlCall, Topology};
    use crate::pipeline::TextureTintPipeline;
    use crate::renderer::test_support::headless;
    use crate::resources::{BufferInit, ScaleMode, TextureDescriptor};

    // ── idempotent rebinding ──────────────────────────────────────────────

    #[test]
    fn texture_sequence_a_b_a_issues_three_binds() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let b = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        r.context_mut().clear_calls();

        assert!(r.set_texture_2d(Some(a), 0));
        assert!(!r.set_texture_2d(Some(a), 0));
        assert!(r.set_texture_2d(Some(b), 0));
        assert!(r.set_texture_2d(Some(a), 0));

        let binds = r.context().count_calls(|c| matches!(c, GlCall::BindTexture(_)));
        assert_eq!(binds, 3);
        assert_eq!(r.state().texture(0), Some(a));
    }

    #[test]
    fn repeated_setters_reach_the_context_once() {
        let mut r = headless(64, 64);
        let fb_tex = r.create_texture_from_source(None, 8, 8, ScaleMode::Nearest).unwrap();
        let fb = r.create_framebuffer(8, 8, fb_tex, false).unwrap();
        r.context_mut().clear_calls();

        for _ in 0..3 {
            r.set_framebuffer(Some(fb));
            r.set_blend_mode(BlendModeId::ADD);
        }
        let gl = r.context();
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BindFramebuffer(_))), 1);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::BlendFuncSeparate(..))), 1);
    }

    #[test]
    fn unit_change_activates_unit_once() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let b = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        r.context_mut().clear_calls();

        r.set_texture_2d(Some(a), 2);
        r.set_texture_2d(Some(b), 2);
        assert_eq!(r.context().count_calls(|c| matches!(c, GlCall::ActiveTexture(2))), 1);
        assert_eq!(r.state().active_texture_unit(), 2);
    }

    // ── flush before switch ───────────────────────────────────────────────

    #[test]
    fn texture_switch_flushes_pending_batch_first() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let b = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let tint = r.default_pipelines().texture_tint;

        r.with_pipeline::<TextureTintPipeline, _>(tint, None, |p, core| {
            p.batch_rect(core, a, crate::geom::Rect::new(0.0, 0.0, 8.0, 8.0), crate::color::Color::WHITE);
        });
        r.context_mut().clear_calls();

        r.set_texture_2d(Some(b), 0);

        let calls = r.context().calls();
        let draw = calls
            .iter()
            .position(|c| matches!(c, GlCall::DrawArrays { topology: Topology::Triangles, .. }));
        let bind = calls.iter().position(|c| matches!(c, GlCall::BindTexture(_)));
        assert!(draw.is_some(), "pending quad was not flushed");
        assert!(draw < bind, "flush must precede the bind: {calls:?}");
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn blend_switch_flushes_pending_batch_first() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let tint = r.default_pipelines().texture_tint;

        r.with_pipeline::<TextureTintPipeline, _>(tint, None, |p, core| {
            p.batch_rect(core, a, crate::geom::Rect::new(0.0, 0.0, 8.0, 8.0), crate::color::Color::WHITE);
        });
        r.context_mut().clear_calls();
        r.set_blend_mode(BlendModeId::SCREEN);

        let calls = r.context().calls();
        let draw = calls.iter().position(|c| matches!(c, GlCall::DrawArrays { .. }));
        let blend = calls.iter().position(|c| matches!(c, GlCall::Enable(Capability::Blend)));
        assert!(draw.is_some() && draw < blend, "{calls:?}");
    }

    #[test]
    fn unchanged_state_never_flushes() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let tint = r.default_pipelines().texture_tint;

        r.with_pipeline::<TextureTintPipeline, _>(tint, None, |p, core| {
            p.batch_rect(core, a, crate::geom::Rect::new(0.0, 0.0, 8.0, 8.0), crate::color::Color::WHITE);
        });
        r.context_mut().clear_calls();
        r.set_texture_2d(Some(a), 0);
        r.set_blend_mode(BlendModeId::NORMAL);

        assert_eq!(r.context().count_calls(|c| matches!(c, GlCall::DrawArrays { .. })), 0);
    }

    fn queue_quad(r: &mut crate::Renderer<crate::context::HeadlessContext>, texture: crate::resources::TextureHandle) {
        let tint = r.default_pipelines().texture_tint;
        r.with_pipeline::<TextureTintPipeline, _>(tint, None, |p, core| {
            p.batch_rect(core, texture, crate::geom::Rect::new(0.0, 0.0, 8.0, 8.0), crate::color::Color::WHITE);
        });
    }

    /// Asserts the queued quad was drawn before `bind` reached the context.
    fn assert_drawn_before(r: &crate::Renderer<crate::context::HeadlessContext>, bind: &GlCall) {
        let calls = r.context().calls();
        let draw = calls.iter().position(|c| matches!(c, GlCall::DrawArrays { .. }));
        let bound = calls.iter().position(|c| c == bind);
        assert!(draw.is_some(), "pending quad was not flushed: {calls:?}");
        assert!(bound.is_some(), "{bind:?} missing: {calls:?}");
        assert!(draw < bound, "flush must precede {bind:?}: {calls:?}");
        assert!(r.context().errors().is_empty(), "{:?}", r.context().errors());
    }

    #[test]
    fn framebuffer_switch_flushes_first_and_same_target_is_free() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let target = r.create_texture_from_source(None, 8, 8, ScaleMode::Nearest).unwrap();
        let fb = r.create_framebuffer(8, 8, target, false).unwrap();
        let raw = r.core().framebuffer(fb).unwrap().raw;

        queue_quad(&mut r, a);
        r.context_mut().clear_calls();
        assert!(!r.set_framebuffer(None));
        assert!(r.context().calls().is_empty());

        assert!(r.set_framebuffer(Some(fb)));
        assert_drawn_before(&r, &GlCall::BindFramebuffer(Some(raw)));
    }

    #[test]
    fn program_switch_flushes_first_and_same_program_is_free() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let other = r
            .create_program(
                include_str!("../../shaders/tint.vert.wgsl"),
                include_str!("../../shaders/tint.frag.wgsl"),
            )
            .unwrap();
        let raw = r.core().program(other).unwrap().raw;

        queue_quad(&mut r, a);
        r.context_mut().clear_calls();
        let current = r.state().program();
        assert!(current.is_some());
        assert!(!r.set_program(current));
        assert!(r.context().calls().is_empty());

        assert!(r.set_program(Some(other)));
        assert_drawn_before(&r, &GlCall::UseProgram(Some(raw)));
    }

    #[test]
    fn vertex_buffer_switch_flushes_first_and_same_buffer_is_free() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let other = r.create_vertex_buffer(BufferInit::Size(256), BufferUsage::Dynamic).unwrap();
        let raw = r.core().buffer(other).unwrap().raw;

        queue_quad(&mut r, a);
        r.context_mut().clear_calls();
        let current = r.state().vertex_buffer();
        assert!(current.is_some());
        assert!(!r.set_vertex_buffer(current));
        assert!(r.context().calls().is_empty());

        assert!(r.set_vertex_buffer(Some(other)));
        assert_drawn_before(&r, &GlCall::BindBuffer(BufferTarget::Vertex, Some(raw)));
    }

    #[test]
    fn index_buffer_switch_flushes_first_and_same_buffer_is_free() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        let indices = r.create_index_buffer(BufferInit::Data(&[0u8; 12]), BufferUsage::Static).unwrap();
        let raw = r.core().buffer(indices).unwrap().raw;

        queue_quad(&mut r, a);
        r.context_mut().clear_calls();
        let current = r.state().index_buffer();
        assert!(!r.set_index_buffer(current));
        assert!(r.context().calls().is_empty());

        assert!(r.set_index_buffer(Some(indices)));
        assert_drawn_before(&r, &GlCall::BindBuffer(BufferTarget::Index, Some(raw)));
        assert_eq!(r.state().index_buffer(), Some(indices));
    }

    // ── blend modes ───────────────────────────────────────────────────────

    #[test]
    fn skip_check_is_a_no_op() {
        let mut r = headless(64, 64);
        r.set_blend_mode(BlendModeId::ADD);
        r.context_mut().clear_calls();

        assert!(!r.set_blend_mode(BlendModeId::SKIP_CHECK));
        assert_eq!(r.state().blend_mode(), Some(BlendModeId::ADD));
        assert!(r.context().calls().is_empty());
    }

    #[test]
    fn normal_uses_two_term_form_and_erase_reverse_subtracts() {
        let mut r = headless(64, 64);
        r.set_blend_mode(BlendModeId::ERASE);
        r.context_mut().clear_calls();
        r.set_blend_mode(BlendModeId::NORMAL);
        assert!(r.context().calls().contains(&GlCall::BlendEquation(BlendEquation::Add)));
        assert!(r
            .context()
            .calls()
            .contains(&GlCall::BlendFunc(BlendFactor::One, BlendFactor::OneMinusSrcAlpha)));

        r.context_mut().clear_calls();
        r.set_blend_mode(BlendModeId::ERASE);
        assert!(r.context().calls().contains(&GlCall::BlendEquation(BlendEquation::ReverseSubtract)));
    }

    #[test]
    fn out_of_range_mode_blends_as_normal() {
        let mut r = headless(64, 64);
        r.set_blend_mode(BlendModeId::ADD);
        r.context_mut().clear_calls();
        assert!(r.set_blend_mode(BlendModeId(500)));
        assert!(r
            .context()
            .calls()
            .contains(&GlCall::BlendFunc(BlendFactor::One, BlendFactor::OneMinusSrcAlpha)));
    }

    #[test]
    fn updating_the_current_custom_mode_reapplies_it() {
        use crate::blend::{BlendFunc, BlendParams};

        let mut r = headless(64, 64);
        let id = r.add_blend_mode(BlendParams::new(
            BlendFunc::Combined(BlendFactor::One, BlendFactor::One),
            BlendEquation::Add,
        ));
        r.set_blend_mode(id);
        r.context_mut().clear_calls();

        assert!(r.update_blend_mode(
            id,
            BlendParams::new(BlendFunc::Combined(BlendFactor::Zero, BlendFactor::One), BlendEquation::Add),
        ));
        assert!(r.context().calls().contains(&GlCall::BlendFunc(BlendFactor::Zero, BlendFactor::One)));

        assert!(r.remove_blend_mode(id));
        assert_eq!(r.state().blend_mode(), Some(BlendModeId::NORMAL));
    }

    // ── stale handles ─────────────────────────────────────────────────────

    #[test]
    fn stale_texture_handle_is_ignored() {
        let mut r = headless(64, 64);
        let a = r.create_texture_2d(TextureDescriptor::new(4, 4)).unwrap();
        assert!(r.delete_texture(a));
        r.context_mut().clear_calls();

        assert!(!r.set_texture_2d(Some(a), 0));
        assert!(r.context().calls().is_empty());
    }
}
