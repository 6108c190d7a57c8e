//! Pipelines: named batching strategies that turn renderables into draws.
//!
//! A pipeline owns at least one program and a vertex buffer. Game objects
//! reach one through [`Renderer::with_pipeline`], queue geometry, and the
//! pipeline flushes it as draw calls whenever bound state is about to
//! change or the batch is full.
//!
//! [`Renderer::with_pipeline`]: crate::renderer::Renderer::with_pipeline

mod batch;
mod bitmap_mask;
mod flat_tint;
mod light;
mod registry;
mod texture_tint;

pub use batch::{Quad, TintEffect, TintVertex, VertexBatch};
pub use bitmap_mask::BitmapMaskPipeline;
pub use flat_tint::FlatTintPipeline;
pub use light::{Light2DPipeline, MAX_LIGHTS};
pub use registry::{PipelineId, PipelineRegistry};
pub use texture_tint::TextureTintPipeline;

use std::any::Any;

use crate::blend::BlendModeId;
use crate::context::GlContext;
use crate::error::Result;
use crate::mask::Mask;
use crate::renderer::{RenderCore, Renderer};
use crate::resources::{BufferHandle, ProgramHandle, TextureHandle};
use crate::scene::{Camera, Scene};

pub const TEXTURE_TINT_PIPELINE: &str = "TextureTintPipeline";
pub const FLAT_TINT_PIPELINE: &str = "FlatTintPipeline";
pub const BITMAP_MASK_PIPELINE: &str = "BitmapMaskPipeline";
pub const LIGHT_PIPELINE: &str = "Light2D";

/// A registered batching strategy.
///
/// Hooks receive the [`RenderCore`] so they can bind state and draw while
/// the registry holding the pipeline is borrowed.
pub trait Pipeline<G: GlContext>: Any {
    fn program(&self) -> ProgramHandle;

    fn vertex_buffer(&self) -> BufferHandle;

    /// Runs once after registration, when the renderer has its blank
    /// texture.
    fn boot(&mut self, _core: &mut RenderCore<G>) -> Result<()> {
        Ok(())
    }

    /// Binds program, vertex buffer, vertex layout and uniforms.
    fn bind(&mut self, core: &mut RenderCore<G>);

    /// Runs on every `set_pipeline`, with the object about to render.
    fn on_bind(&mut self, _core: &mut RenderCore<G>, _object: Option<&dyn Renderable<G>>) {}

    /// Draws pending vertices. No-op when nothing is queued.
    fn flush(&mut self, core: &mut RenderCore<G>);

    /// Logical size and resolution of the renderer changed.
    fn resize(&mut self, width: f32, height: f32, resolution: f32);

    fn on_pre_render(&mut self, _core: &mut RenderCore<G>) {}

    fn on_render(&mut self, _core: &mut RenderCore<G>, _scene: &Scene, _camera: &Camera) {}

    fn on_post_render(&mut self, _core: &mut RenderCore<G>) {}

    /// Releases every GPU object the pipeline created.
    fn destroy(&mut self, core: &mut RenderCore<G>);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Something the frame orchestrator can draw.
pub trait Renderable<G: GlContext> {
    fn will_render(&self, _camera: &Camera) -> bool {
        true
    }

    fn blend_mode(&self) -> BlendModeId {
        BlendModeId::NORMAL
    }

    fn mask(&self) -> Option<&dyn Mask<G>> {
        None
    }

    /// Normal map sampled by the light pipeline.
    fn normal_map(&self) -> Option<TextureHandle> {
        None
    }

    fn render_gl(&self, renderer: &mut Renderer<G>, interpolation: f32, camera: &Camera);
}

/// Ids of the pipelines every renderer registers at init.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DefaultPipelines {
    pub texture_tint: PipelineId,
    pub flat_tint: PipelineId,
    pub bitmap_mask: PipelineId,
    pub light: PipelineId,
}

pub(crate) fn register_defaults<G: GlContext>(
    core: &mut RenderCore<G>,
    registry: &mut PipelineRegistry<G>,
) -> Result<DefaultPipelines> {
    let texture_tint = TextureTintPipeline::new(core)?;
    let texture_tint = registry.add(core, TEXTURE_TINT_PIPELINE, Box::new(texture_tint));

    let flat_tint = FlatTintPipeline::new(core)?;
    let flat_tint = registry.add(core, FLAT_TINT_PIPELINE, Box::new(flat_tint));

    let bitmap_mask = BitmapMaskPipeline::new(core)?;
    let bitmap_mask = registry.add(core, BITMAP_MASK_PIPELINE, Box::new(bitmap_mask));

    let light = Light2DPipeline::new(core)?;
    let light = registry.add(core, LIGHT_PIPELINE, Box::new(light));

    Ok(DefaultPipelines { texture_tint, flat_tint, bitmap_mask, light })
}
