//! The renderer: GPU resource ownership, cached binding state, scissor
//! stack, pipeline registry, per-frame orchestration and context lifecycle.
//!
//! State is split in two halves so pipelines can borrow the GPU side while
//! the registry that owns them is borrowed too:
//! - [`RenderCore`]: context, tracker cache, scissor stack, resource arenas
//! - [`Renderer`]: the core plus the [`PipelineRegistry`], snapshot requests
//!   and lifecycle callbacks
//!
//! Tracker setters on the core take the flush to run before a state change
//! as a closure. [`Renderer`] wraps every setter and passes "flush the
//! current pipeline"; pipelines call the core directly and pass their own
//! flush (or a no-op while already flushing).

mod factory;
mod frame;
mod lifecycle;
mod scissor;
mod snapshot;
mod state;

pub use lifecycle::{ContextState, LifecycleCallback};
pub use scissor::{ScissorStack, SCISSOR_STACK_SIZE};
pub use snapshot::{Snapshot, SnapshotCallback, SnapshotFormat, SnapshotPixelCallback};
pub use state::RenderState;

use crate::blend::BlendModeTable;
use crate::color::Color;
use crate::config::{self, RendererConfig};
use crate::context::{GlContext, Topology};
use crate::error::{RenderError, Result};
use crate::pipeline::{DefaultPipelines, PipelineId, PipelineRegistry};
use crate::resources::{
    Arena, BufferHandle, Framebuffer, GpuBuffer, NativeTexture, Program, TextureHandle,
};

use self::snapshot::SnapshotRequest;

/// GPU-facing half of the renderer.
pub struct RenderCore<G: GlContext> {
    gl: G,
    config: RendererConfig,
    /// Drawing buffer size in device pixels.
    width: u32,
    height: u32,
    context_state: ContextState,

    state: RenderState,
    scissor: ScissorStack,
    blend_modes: BlendModeTable,

    textures: Arena<NativeTexture>,
    framebuffers: Arena<Framebuffer>,
    programs: Arena<Program>,
    buffers: Arena<GpuBuffer>,

    /// 1x1 opaque white texture for untextured draws.
    blank_texture: Option<TextureHandle>,
}

impl<G: GlContext> RenderCore<G> {
    fn new(gl: G, config: RendererConfig) -> Self {
        let (width, height) = config.device_size();
        let units = gl.max_texture_units();
        Self {
            gl,
            config,
            width,
            height,
            context_state: ContextState::Active,
            state: RenderState::new(units),
            scissor: ScissorStack::new(width, height),
            blend_modes: BlendModeTable::new(),
            textures: Arena::new(),
            framebuffers: Arena::new(),
            programs: Arena::new(),
            buffers: Arena::new(),
            blank_texture: None,
        }
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    /// Direct context access for pipelines (uploads, draws, uniforms).
    /// Binding changes must go through the tracker setters instead.
    pub fn gl_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn scissor(&self) -> &ScissorStack {
        &self.scissor
    }

    pub fn blend_modes(&self) -> &BlendModeTable {
        &self.blend_modes
    }

    pub fn context_state(&self) -> ContextState {
        self.context_state
    }

    pub fn is_active(&self) -> bool {
        self.context_state == ContextState::Active
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_state == ContextState::Lost
    }

    /// Drawing buffer width in device pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Drawing buffer height in device pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> f32 {
        self.config.resolution
    }

    /// Size in logical pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        (self.config.width as f32, self.config.height as f32)
    }

    pub fn blank_texture(&self) -> Option<TextureHandle> {
        self.blank_texture
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&NativeTexture> {
        self.textures.get(handle)
    }

    pub fn framebuffer(&self, handle: crate::resources::FramebufferHandle) -> Option<&Framebuffer> {
        self.framebuffers.get(handle)
    }

    pub fn program(&self, handle: crate::resources::ProgramHandle) -> Option<&Program> {
        self.programs.get(handle)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&GpuBuffer> {
        self.buffers.get(handle)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.context_state {
            ContextState::Active => Ok(()),
            ContextState::Lost => Err(RenderError::ContextLost),
            ContextState::Destroyed => {
                Err(RenderError::ContextUnavailable("renderer destroyed".into()))
            }
        }
    }

    /// Uploads a uniform block for the program in use.
    pub fn set_uniform_block(&mut self, data: &[u8]) {
        if self.is_active() {
            self.gl.uniform_block(data);
        }
    }

    /// Issues a non-indexed draw with the current bindings.
    pub fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        if self.is_active() && count > 0 {
            self.gl.draw_arrays(topology, first, count);
        }
    }

    /// Clears color of the bound framebuffer to `color` (straight alpha).
    pub fn clear(&mut self, color: Color) {
        if !self.is_active() {
            return;
        }
        self.gl.clear_color(color.premultiplied().to_array());
        self.gl.clear(crate::context::ClearFlags::COLOR);
    }

    fn resize(&mut self, width: u32, height: u32, resolution: f32) {
        self.config.width = width;
        self.config.height = height;
        self.config.resolution = resolution;

        let (dw, dh) = config::device_size(width, height, resolution);
        self.width = dw;
        self.height = dh;
        self.scissor.reset(dw, dh);
        if self.is_active() {
            self.gl.resize_drawing_buffer(dw, dh);
            self.gl.viewport(0, 0, dw as i32, dh as i32);
            self.gl.set_capability(crate::context::Capability::ScissorTest, false);
        }
        log::debug!("renderer resized to {width}x{height} @{resolution} ({dw}x{dh} device px)");
    }
}

/// The renderer owned by a game instance.
pub struct Renderer<G: GlContext> {
    core: RenderCore<G>,
    pipelines: PipelineRegistry<G>,
    defaults: DefaultPipelines,

    lost_callbacks: Vec<LifecycleCallback<G>>,
    restored_callbacks: Vec<LifecycleCallback<G>>,

    snapshot: Option<SnapshotRequest>,
    /// `pre_render` acquired a frame that `post_render` has not presented.
    frame_open: bool,
}

impl<G: GlContext> Renderer<G> {
    /// Creates the renderer and runs the init routine: default GL state,
    /// blank texture, default pipelines, NORMAL blend and a resize to the
    /// configured size.
    pub fn new(gl: G, config: RendererConfig) -> Result<Self> {
        let mut renderer = Self {
            core: RenderCore::new(gl, config),
            pipelines: PipelineRegistry::new(),
            defaults: DefaultPipelines::default(),
            lost_callbacks: Vec::new(),
            restored_callbacks: Vec::new(),
            snapshot: None,
            frame_open: false,
        };
        renderer.init()?;
        Ok(renderer)
    }

    pub fn core(&self) -> &RenderCore<G> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut RenderCore<G> {
        &mut self.core
    }

    /// The underlying context.
    pub fn context(&self) -> &G {
        &self.core.gl
    }

    pub fn context_mut(&mut self) -> &mut G {
        &mut self.core.gl
    }

    pub fn config(&self) -> &RendererConfig {
        &self.core.config
    }

    pub fn state(&self) -> &RenderState {
        &self.core.state
    }

    pub fn width(&self) -> u32 {
        self.core.width
    }

    pub fn height(&self) -> u32 {
        self.core.height
    }

    pub fn background_color(&self) -> Color {
        self.core.config.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.core.config.background_color = color;
    }

    pub fn pipelines(&self) -> &PipelineRegistry<G> {
        &self.pipelines
    }

    /// Ids of the default pipeline set.
    pub fn default_pipelines(&self) -> DefaultPipelines {
        self.defaults
    }

    /// Resizes to `width × height` logical pixels at the current resolution.
    pub fn resize(&mut self, width: u32, height: u32) {
        let resolution = self.core.config.resolution;
        self.resize_with_resolution(width, height, resolution);
    }

    pub fn resize_with_resolution(&mut self, width: u32, height: u32, resolution: f32) {
        self.flush();
        self.core.resize(width, height, resolution);
        self.pipelines.resize_all(width as f32, height as f32, resolution);
    }

    /// Clears the bound framebuffer's color.
    pub fn clear(&mut self, color: Color) {
        self.flush();
        self.core.clear(color);
    }

    /// Sets the current pipeline and runs `f` with it downcast to `P`.
    ///
    /// `None` when `id` is unknown or not a `P`.
    pub fn with_pipeline<P, R>(
        &mut self,
        id: PipelineId,
        object: Option<&dyn crate::pipeline::Renderable<G>>,
        f: impl FnOnce(&mut P, &mut RenderCore<G>) -> R,
    ) -> Option<R>
    where
        P: crate::pipeline::Pipeline<G>,
    {
        let Self { core, pipelines, .. } = self;
        pipelines.set_pipeline(core, id, object)?;
        let pipeline = pipelines.get_mut(id)?.as_any_mut().downcast_mut::<P>()?;
        Some(f(pipeline, core))
    }

    /// Makes `id` current (flush + bind when it differs) and calls its
    /// `on_bind` with `object`.
    pub fn set_pipeline(
        &mut self,
        id: PipelineId,
        object: Option<&dyn crate::pipeline::Renderable<G>>,
    ) -> Option<PipelineId> {
        let Self { core, pipelines, .. } = self;
        pipelines.set_pipeline(core, id, object)
    }

    pub fn current_pipeline(&self) -> Option<PipelineId> {
        self.pipelines.current()
    }

    /// Registers a pipeline under `name`. A duplicate name keeps the
    /// existing pipeline and destroys `pipeline`.
    pub fn add_pipeline(
        &mut self,
        name: &str,
        pipeline: Box<dyn crate::pipeline::Pipeline<G>>,
    ) -> PipelineId {
        let Self { core, pipelines, .. } = self;
        pipelines.add(core, name, pipeline)
    }

    pub fn get_pipeline(&self, name: &str) -> Option<PipelineId> {
        self.pipelines.get(name)
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.has(name)
    }

    pub fn remove_pipeline(&mut self, name: &str) -> bool {
        let Self { core, pipelines, .. } = self;
        pipelines.remove(core, name)
    }

    /// Downcast access to a registered pipeline without binding it.
    pub fn pipeline_mut<P: crate::pipeline::Pipeline<G>>(&mut self, id: PipelineId) -> Option<&mut P> {
        self.pipelines.get_mut(id)?.as_any_mut().downcast_mut::<P>()
    }

    /// Flushes the current pipeline's pending batch.
    pub fn flush(&mut self) {
        let Self { core, pipelines, .. } = self;
        pipelines.flush_current(core);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::context::HeadlessContext;

    pub(crate) fn headless(width: u32, height: u32) -> Renderer<HeadlessContext> {
        let config = RendererConfig::default().with_size(width, height);
        Renderer::new(HeadlessContext::new(width, height), config).unwrap()
    }
}
