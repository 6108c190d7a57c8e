use std::collections::HashMap;

use super::{Pipeline, Renderable};
use crate::context::GlContext;
use crate::error::Result;
use crate::renderer::RenderCore;
use crate::resources::{Arena, Handle};

/// Generation-checked id of a registered pipeline.
///
/// Slots of removed pipelines are reused; an id kept past `remove` never
/// resolves to the pipeline registered in its place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineId {
    index: u32,
    generation: u32,
}

impl PipelineId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    fn of<G: GlContext>(handle: Handle<Entry<G>>) -> Self {
        Self { index: handle.index(), generation: handle.generation() }
    }

    fn handle<G: GlContext>(self) -> Handle<Entry<G>> {
        Handle::from_raw_parts(self.index, self.generation)
    }
}

/// Resolves to nothing until the default pipelines are registered.
impl Default for PipelineId {
    fn default() -> Self {
        Self { index: u32::MAX, generation: 0 }
    }
}

struct Entry<G: GlContext> {
    name: String,
    pipeline: Box<dyn Pipeline<G>>,
}

/// Name-keyed pipelines owned by the renderer, at most one of them current.
pub struct PipelineRegistry<G: GlContext> {
    entries: Arena<Entry<G>>,
    names: HashMap<String, PipelineId>,
    current: Option<PipelineId>,
}

impl<G: GlContext> Default for PipelineRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GlContext> PipelineRegistry<G> {
    pub fn new() -> Self {
        Self { entries: Arena::new(), names: HashMap::new(), current: None }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn current(&self) -> Option<PipelineId> {
        self.current
    }

    /// Registers `pipeline` under `name` and sizes it to the renderer.
    ///
    /// When `name` is taken the existing pipeline is kept (and resized) and
    /// `pipeline` is destroyed.
    pub fn add(
        &mut self,
        core: &mut RenderCore<G>,
        name: &str,
        mut pipeline: Box<dyn Pipeline<G>>,
    ) -> PipelineId {
        let (width, height) = core.logical_size();
        let resolution = core.resolution();

        if let Some(&id) = self.names.get(name) {
            log::warn!("Pipeline {name} already exists.");
            pipeline.destroy(core);
            if let Some(existing) = self.get_mut(id) {
                existing.resize(width, height, resolution);
            }
            return id;
        }

        pipeline.resize(width, height, resolution);
        let id = PipelineId::of(self.entries.insert(Entry { name: name.to_owned(), pipeline }));
        self.names.insert(name.to_owned(), id);
        log::debug!("registered pipeline {name} as {id:?}");
        id
    }

    pub fn get(&self, name: &str) -> Option<PipelineId> {
        self.names.get(name).copied()
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn name(&self, id: PipelineId) -> Option<&str> {
        self.entry(id).map(|e| e.name.as_str())
    }

    pub fn get_mut(&mut self, id: PipelineId) -> Option<&mut dyn Pipeline<G>> {
        self.entries.get_mut(id.handle()).map(|e| e.pipeline.as_mut())
    }

    fn entry(&self, id: PipelineId) -> Option<&Entry<G>> {
        self.entries.get(id.handle())
    }

    /// Removes and destroys the pipeline registered as `name`. A current
    /// pipeline is flushed and stops being current first.
    pub fn remove(&mut self, core: &mut RenderCore<G>, name: &str) -> bool {
        let Some(id) = self.names.remove(name) else { return false };
        if self.current == Some(id) {
            self.flush_current(core);
            self.current = None;
        }
        match self.entries.remove(id.handle()) {
            Some(mut entry) => {
                entry.pipeline.destroy(core);
                log::debug!("removed pipeline {name}");
                true
            }
            None => false,
        }
    }

    /// Makes `id` current. Flushes the previous pipeline and binds `id`
    /// when the pipeline, its program or its vertex buffer differ from the
    /// bound state; `on_bind(object)` runs either way.
    pub fn set_pipeline(
        &mut self,
        core: &mut RenderCore<G>,
        id: PipelineId,
        object: Option<&dyn Renderable<G>>,
    ) -> Option<PipelineId> {
        let Some(entry) = self.entry(id) else {
            log::warn!("set_pipeline with unknown pipeline {id:?}");
            return None;
        };
        let pipeline = &entry.pipeline;
        let state = core.state();
        let changed = self.current != Some(id)
            || state.program() != Some(pipeline.program())
            || state.vertex_buffer() != Some(pipeline.vertex_buffer());

        if changed {
            self.flush_current(core);
            self.current = Some(id);
            if let Some(pipeline) = self.get_mut(id) {
                pipeline.bind(core);
            }
        }

        if let Some(pipeline) = self.get_mut(id) {
            pipeline.on_bind(core, object);
        }
        self.current
    }

    /// Forgets the current pipeline without flushing it.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn flush_current(&mut self, core: &mut RenderCore<G>) {
        let Some(id) = self.current else { return };
        if let Some(pipeline) = self.get_mut(id) {
            pipeline.flush(core);
        }
    }

    /// Runs `f` on every pipeline, in slot order.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut dyn Pipeline<G>)) {
        for entry in self.entries.values_mut() {
            f(entry.pipeline.as_mut());
        }
    }

    pub fn resize_all(&mut self, width: f32, height: f32, resolution: f32) {
        self.for_each(|p| p.resize(width, height, resolution));
    }

    pub fn boot_all(&mut self, core: &mut RenderCore<G>) -> Result<()> {
        for entry in self.entries.values_mut() {
            entry.pipeline.boot(core)?;
        }
        Ok(())
    }

    /// Destroys and removes every pipeline.
    pub fn destroy_all(&mut self, core: &mut RenderCore<G>) {
        self.current = None;
        for mut entry in self.entries.drain() {
            entry.pipeline.destroy(core);
        }
        self.names.clear();
    }
}
