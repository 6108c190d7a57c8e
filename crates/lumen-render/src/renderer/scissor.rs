use super::{RenderCore, Renderer};
use crate::context::{Capability, GlContext};
use crate::geom::DeviceRect;

/// Depth of the pre-allocated scissor stack.
pub const SCISSOR_STACK_SIZE: usize = 1000;

/// Current scissor rectangle plus a fixed-size LIFO of saved ones.
///
/// Rectangles are in device pixels with a top-left origin; the y flip to
/// the context's bottom-left origin happens when the rectangle is applied.
#[derive(Debug, Clone)]
pub struct ScissorStack {
    stack: Box<[DeviceRect]>,
    depth: usize,
    current: DeviceRect,
    enabled: bool,
}

impl ScissorStack {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            stack: vec![DeviceRect::default(); SCISSOR_STACK_SIZE].into_boxed_slice(),
            depth: 0,
            current: DeviceRect::full(width, height),
            enabled: false,
        }
    }

    pub fn current(&self) -> DeviceRect {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the scissor test is enabled on the context.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Back to the full buffer with the test disabled and nothing saved.
    pub(crate) fn reset(&mut self, width: u32, height: u32) {
        self.depth = 0;
        self.current = DeviceRect::full(width, height);
        self.enabled = false;
    }
}

impl<G: GlContext> RenderCore<G> {
    /// Sets the scissor rectangle. The full-buffer rectangle disables the
    /// scissor test instead of clipping to it.
    pub fn set_scissor(&mut self, rect: DeviceRect, flush: impl FnOnce(&mut Self)) {
        if !self.is_active() || rect == self.scissor.current {
            return;
        }

        flush(self);
        self.scissor.current = rect;

        let full = rect == DeviceRect::full(self.width, self.height);
        if full {
            if self.scissor.enabled {
                self.gl.set_capability(Capability::ScissorTest, false);
                self.scissor.enabled = false;
            }
            return;
        }

        if !self.scissor.enabled {
            self.gl.set_capability(Capability::ScissorTest, true);
            self.scissor.enabled = true;
        }
        let flipped_y = self.height as i32 - rect.y - rect.height;
        self.gl.scissor(rect.x, flipped_y, rect.width, rect.height);
    }

    /// Saves the current rectangle and applies `rect`.
    ///
    /// # Panics
    /// When more than [`SCISSOR_STACK_SIZE`] rectangles are pushed.
    pub fn push_scissor(&mut self, rect: DeviceRect, flush: impl FnOnce(&mut Self)) {
        let depth = self.scissor.depth;
        assert!(depth < SCISSOR_STACK_SIZE, "scissor stack overflow ({SCISSOR_STACK_SIZE} entries)");
        self.scissor.stack[depth] = self.scissor.current;
        self.scissor.depth = depth + 1;
        self.set_scissor(rect, flush);
    }

    /// Restores the rectangle saved by the matching push.
    ///
    /// # Panics
    /// On a pop without a matching push.
    pub fn pop_scissor(&mut self, flush: impl FnOnce(&mut Self)) {
        assert!(self.scissor.depth > 0, "pop_scissor without a matching push_scissor");
        self.scissor.depth -= 1;
        let rect = self.scissor.stack[self.scissor.depth];
        self.set_scissor(rect, flush);
    }
}

impl<G: GlContext> Renderer<G> {
    pub fn set_scissor(&mut self, rect: DeviceRect) {
        let Self { core, pipelines, .. } = self;
        core.set_scissor(rect, |core| pipelines.flush_current(core));
    }

    pub fn push_scissor(&mut self, rect: DeviceRect) {
        let Self { core, pipelines, .. } = self;
        core.push_scissor(rect, |core| pipelines.flush_current(core));
    }

    pub fn pop_scissor(&mut self) {
        let Self { core, pipelines, .. } = self;
        core.pop_scissor(|core| pipelines.flush_current(core));
    }

    pub fn scissor(&self) -> &ScissorStack {
        &self.core.scissor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlCall;
    use crate::renderer::test_support::headless;

    #[test]
    fn push_then_pop_restores_rect_and_test_state() {
        let mut r = headless(100, 80);
        let before = r.scissor().current();
        let enabled_before = r.context().scissor_enabled();

        r.push_scissor(DeviceRect::new(10, 5, 20, 30));
        assert_eq!(r.scissor().depth(), 1);
        assert!(r.context().scissor_enabled());

        r.pop_scissor();
        assert_eq!(r.scissor().current(), before);
        assert_eq!(r.scissor().depth(), 0);
        assert_eq!(r.context().scissor_enabled(), enabled_before);
    }

    #[test]
    fn scissor_y_is_flipped_to_bottom_left() {
        let mut r = headless(100, 80);
        r.context_mut().clear_calls();
        r.set_scissor(DeviceRect::new(10, 5, 20, 30));
        // 80 - 5 - 30
        assert!(r.context().calls().contains(&GlCall::Scissor(10, 45, 20, 30)));
    }

    #[test]
    fn full_buffer_rect_disables_the_test() {
        let mut r = headless(100, 80);
        r.set_scissor(DeviceRect::new(0, 0, 50, 50));
        r.context_mut().clear_calls();

        r.set_scissor(DeviceRect::full(100, 80));
        assert_eq!(r.context().calls(), &[GlCall::Disable(Capability::ScissorTest)]);
        assert!(!r.scissor().enabled());
    }

    #[test]
    fn unchanged_rect_issues_nothing() {
        let mut r = headless(100, 80);
        r.set_scissor(DeviceRect::new(1, 2, 3, 4));
        r.context_mut().clear_calls();
        r.set_scissor(DeviceRect::new(1, 2, 3, 4));
        assert!(r.context().calls().is_empty());
    }

    #[test]
    fn nested_pushes_unwind_in_order() {
        let mut r = headless(100, 80);
        let outer = DeviceRect::new(0, 0, 60, 60);
        let inner = DeviceRect::new(10, 10, 20, 20);

        r.push_scissor(outer);
        r.push_scissor(inner);
        assert_eq!(r.scissor().current(), inner);
        r.pop_scissor();
        assert_eq!(r.scissor().current(), outer);
        r.pop_scissor();
        assert_eq!(r.scissor().current(), DeviceRect::full(100, 80));
    }

    #[test]
    #[should_panic(expected = "without a matching push")]
    fn unbalanced_pop_panics() {
        let mut r = headless(10, 10);
        r.pop_scissor();
    }
}
