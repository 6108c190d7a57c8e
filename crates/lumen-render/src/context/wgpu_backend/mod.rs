//! wgpu implementation of [`GlContext`].
//!
//! Immediate-mode calls are translated one to one: binds and fixed-function
//! calls update a small state block, and every draw or clear encodes a single
//! render pass and submits it. Buffer and uniform writes issued before a draw
//! are therefore always visible to that draw and never to an earlier one.

mod convert;
mod gpu;
mod objects;
mod pipelines;
mod readback;

use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use self::gpu::{Gpu, SurfaceErrorAction};
use self::objects::{
    BufferObject, FramebufferObject, Objects, ProgramObject, RenderbufferObject, TextureObject,
};
use self::pipelines::{PipelineCache, PipelineKey};
use super::shader::{self, LinkedProgram};
use super::types::*;
use super::GlContext;
use crate::error::{RenderError, Result};

pub use self::gpu::WgpuContextInit;

/// Texture units exposed to programs.
const TEXTURE_UNITS: usize = 8;

#[derive(Default)]
struct Bound {
    active_unit: usize,
    units: [Option<TextureId>; TEXTURE_UNITS],
    framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    layout: Option<VertexLayout>,
    blend_enabled: bool,
    blend: BlendState,
    scissor_enabled: bool,
    scissor: (i32, i32, i32, i32),
    viewport: (i32, i32, i32, i32),
    clear_color: [f32; 4],
}

/// Color (and optional depth-stencil) attachment a pass renders into.
struct Target {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth_stencil: Option<wgpu::TextureView>,
}

pub struct WgpuContext {
    window: Arc<Window>,
    init: WgpuContextInit,
    gpu: Gpu,
    objects: Objects,
    pipelines: PipelineCache,
    white: TextureObject,
    bound: Bound,
    frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
}

impl WgpuContext {
    /// Creates a context rendering into `window`. Blocks on adapter and
    /// device acquisition.
    pub fn new(window: Arc<Window>, init: WgpuContextInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window), &init))
            .map_err(|e| RenderError::ContextUnavailable(format!("{e:#}")))?;
        let white = TextureObject::white(&gpu.device, &gpu.queue);

        Ok(Self {
            window,
            init,
            gpu,
            objects: Objects::default(),
            pipelines: PipelineCache::default(),
            white,
            bound: Bound::default(),
            frame: None,
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.gpu.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.gpu.queue
    }

    fn bound_texture(&mut self) -> Option<&mut TextureObject> {
        let id = self.bound.units.get(self.bound.active_unit).copied().flatten()?;
        self.objects.textures.get_mut(&id)
    }

    fn bound_buffer(&mut self, target: BufferTarget) -> Option<&mut BufferObject> {
        let id = match target {
            BufferTarget::Vertex => self.bound.vertex_buffer,
            BufferTarget::Index => self.bound.index_buffer,
        }?;
        self.objects.buffers.get_mut(&id)
    }

    fn current_target(&self) -> Option<Target> {
        match self.bound.framebuffer {
            None => {
                let (frame, view) = self.frame.as_ref()?;
                Some(Target {
                    view: view.clone(),
                    format: frame.texture.format(),
                    width: frame.texture.width(),
                    height: frame.texture.height(),
                    depth_stencil: None,
                })
            }
            Some(fb) => {
                let fb = self.objects.framebuffers.get(&fb)?;
                let color = self.objects.textures.get(&fb.color?)?;
                let depth_stencil = fb
                    .depth_stencil
                    .and_then(|rb| self.objects.renderbuffers.get(&rb))
                    .and_then(|rb| rb.view.clone());
                Some(Target {
                    view: color.view.clone()?,
                    format: objects::TEXTURE_FORMAT,
                    width: color.width,
                    height: color.height,
                    depth_stencil,
                })
            }
        }
    }

    fn bind_group(&self, program: &ProgramObject) -> Option<wgpu::BindGroup> {
        let mut entries = Vec::new();

        if program.interface.uniforms {
            let Some(buffer) = &program.uniforms else {
                log::error!("draw with a program whose uniform block was never written");
                return None;
            };
            entries.push(wgpu::BindGroupEntry {
                binding: shader::UNIFORM_BINDING,
                resource: buffer.as_entire_binding(),
            });
        }

        let mut views = Vec::new();
        for &unit in &program.interface.texture_units {
            let texture = self.bound.units
                .get(unit)
                .copied()
                .flatten()
                .and_then(|id| self.objects.textures.get(&id))
                .filter(|t| t.view.is_some())
                .unwrap_or(&self.white);
            views.push((unit, texture));
        }
        for (unit, texture) in &views {
            let Some(view) = texture.view.as_ref() else { continue };
            entries.push(wgpu::BindGroupEntry {
                binding: shader::texture_binding(*unit),
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: shader::sampler_binding(*unit),
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        Some(self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lumen draw bind group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    fn draw(&mut self, topology: Topology, vertices: std::ops::Range<u32>, indexed: bool) {
        if self.gpu.is_lost() {
            return;
        }
        let Some(program_id) = self.bound.program else {
            log::error!("draw without a program in use");
            return;
        };
        let Some(layout) = self.bound.layout.clone() else {
            log::error!("draw without a vertex layout");
            return;
        };
        let Some(target) = self.current_target() else {
            log::warn!("draw without a render target (no frame acquired?)");
            return;
        };
        let Some(vertex_buffer) = self.bound.vertex_buffer
            .and_then(|b| self.objects.buffers.get(&b))
            .and_then(|b| b.buffer.clone())
        else {
            log::error!("draw without a vertex buffer");
            return;
        };
        let index_buffer = self.bound.index_buffer
            .and_then(|b| self.objects.buffers.get(&b))
            .and_then(|b| b.buffer.clone());
        if indexed && index_buffer.is_none() {
            log::error!("indexed draw without an index buffer");
            return;
        }

        let Some(scissor) = self.pass_scissor(&target) else { return };
        let Some(viewport) = convert::flip_and_clamp(self.bound.viewport, target.width, target.height)
        else {
            return;
        };

        let Some(program) = self.objects.programs.get(&program_id) else {
            log::error!("draw with deleted program {program_id:?}");
            return;
        };
        let Some(bind_group) = self.bind_group(program) else { return };
        let key = PipelineKey {
            program: program_id,
            layout,
            blend: self.bound.blend_enabled.then_some(self.bound.blend),
            format: target.format,
            topology,
        };
        let pipeline = self.pipelines.get_or_create(&self.gpu.device, key, program);

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen draw encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
            rpass.set_viewport(
                viewport.0 as f32,
                viewport.1 as f32,
                viewport.2 as f32,
                viewport.3 as f32,
                0.0,
                1.0,
            );
            let (sx, sy, sw, sh) = scissor;
            rpass.set_scissor_rect(sx, sy, sw, sh);

            match index_buffer {
                Some(indices) if indexed => {
                    rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(vertices, 0, 0..1);
                }
                _ => rpass.draw(vertices, 0..1),
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Scissor for a pass into `target`; `None` when it clips everything.
    fn pass_scissor(&self, target: &Target) -> Option<(u32, u32, u32, u32)> {
        if self.bound.scissor_enabled {
            convert::flip_and_clamp(self.bound.scissor, target.width, target.height)
        } else {
            Some((0, 0, target.width, target.height))
        }
    }

    fn reset_objects(&mut self) {
        self.objects = Objects::default();
        self.pipelines.clear();
        self.bound = Bound::default();
        self.frame = None;
    }
}

impl GlContext for WgpuContext {
    fn is_context_lost(&self) -> bool {
        self.gpu.is_lost()
    }

    fn restore(&mut self) -> Result<()> {
        let size = self.gpu.size();
        let gpu = pollster::block_on(Gpu::new(Arc::clone(&self.window), &self.init))
            .map_err(|e| RenderError::ContextUnavailable(format!("{e:#}")))?;

        self.reset_objects();
        self.white = TextureObject::white(&gpu.device, &gpu.queue);
        self.gpu = gpu;
        self.gpu.resize(size);
        log::info!("wgpu context restored");
        Ok(())
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }

    fn resize_drawing_buffer(&mut self, width: u32, height: u32) {
        self.frame = None;
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    fn max_texture_units(&self) -> usize {
        TEXTURE_UNITS
    }

    fn max_texture_size(&self) -> u32 {
        self.gpu.device.limits().max_texture_dimension_2d
    }

    fn begin_frame(&mut self) -> Result<bool> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        if self.frame.is_some() {
            return Ok(true);
        }

        match self.gpu.acquire() {
            Ok(frame) => {
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                self.frame = Some((frame, view));
                Ok(true)
            }
            Err(err) => match self.gpu.handle_surface_error(err) {
                SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                    log::debug!("skipping frame after surface error");
                    Ok(false)
                }
                SurfaceErrorAction::Fatal => Err(RenderError::Surface("out of memory".into())),
            },
        }
    }

    fn end_frame(&mut self) {
        if let Some((frame, view)) = self.frame.take() {
            drop(view);
            frame.present();
        }
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::Blend => self.bound.blend_enabled = enabled,
            Capability::ScissorTest => self.bound.scissor_enabled = enabled,
            // No depth attachment is ever sampled and culling stays off.
            Capability::DepthTest | Capability::CullFace => {}
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.bound.viewport = (x, y, width, height);
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.bound.scissor = (x, y, width, height);
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.bound.clear_color = rgba;
    }

    fn clear(&mut self, flags: ClearFlags) {
        if self.gpu.is_lost() {
            return;
        }
        let Some(target) = self.current_target() else { return };

        let color_load = if flags.color {
            wgpu::LoadOp::Clear(convert::clear_color(self.bound.clear_color))
        } else {
            wgpu::LoadOp::Load
        };
        let depth_stencil_attachment =
            target.depth_stencil.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if flags.depth { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: if flags.stencil { wgpu::LoadOp::Clear(0) } else { wgpu::LoadOp::Load },
                    store: wgpu::StoreOp::Store,
                }),
            });

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen clear encoder"),
        });
        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: color_load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation) {
        self.bound.blend.color_equation = color;
        self.bound.blend.alpha_equation = alpha;
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        let blend = &mut self.bound.blend;
        blend.src_rgb = src_rgb;
        blend.dst_rgb = dst_rgb;
        blend.src_alpha = src_alpha;
        blend.dst_alpha = dst_alpha;
    }

    fn active_texture(&mut self, unit: usize) {
        if unit < TEXTURE_UNITS {
            self.bound.active_unit = unit;
        } else {
            log::error!("texture unit {unit} out of range (max {TEXTURE_UNITS})");
        }
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.bound.units[self.bound.active_unit] = texture;
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound.framebuffer = framebuffer;
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.bound.program = program;
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        match target {
            BufferTarget::Vertex => self.bound.vertex_buffer = buffer,
            BufferTarget::Index => self.bound.index_buffer = buffer,
        }
    }

    fn vertex_layout(&mut self, layout: &VertexLayout) {
        if self.bound.layout.as_ref() != Some(layout) {
            self.bound.layout = Some(layout.clone());
        }
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        let id = TextureId(self.objects.name());
        self.objects.textures.insert(id, TextureObject::new(&self.gpu.device));
        Ok(id)
    }

    fn tex_parameters(&mut self, params: TextureParams) {
        let sampler = convert::sampler(&self.gpu.device, &params);
        match self.bound_texture() {
            Some(texture) => texture.sampler = sampler,
            None => log::error!("tex_parameters without a bound texture"),
        }
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) -> Result<()> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        if image.mip_level != 0 {
            log::debug!("ignoring upload to mip level {}", image.mip_level);
            return Ok(());
        }

        let max = self.gpu.device.limits().max_texture_dimension_2d;
        if image.width == 0 || image.height == 0 || image.width > max || image.height > max {
            log::error!("texture size {}x{} outside 1..={max}", image.width, image.height);
            return Ok(());
        }

        let expected = image.width as usize * image.height as usize * image.format.bytes_per_pixel();
        let pixels = match image.pixels {
            Some(p) if p.len() < expected => {
                return Err(RenderError::Readback(format!(
                    "texture upload of {} bytes, expected {expected}",
                    p.len()
                )));
            }
            Some(p) => Some(objects::prepare_pixels(&image, p)),
            None => None,
        };

        let device = self.gpu.device.clone();
        let queue = self.gpu.queue.clone();
        let Some(texture) = self.bound_texture() else {
            log::error!("tex_image_2d without a bound texture");
            return Ok(());
        };
        texture.allocate(&device, image.width, image.height);
        if let (Some(raw), Some(pixels)) = (&texture.texture, pixels) {
            objects::write_pixels(&queue, raw, image.width, image.height, &pixels);
        }
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.objects.textures.remove(&texture);
        for unit in &mut self.bound.units {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        let id = FramebufferId(self.objects.name());
        self.objects.framebuffers.insert(id, FramebufferObject::default());
        Ok(id)
    }

    fn framebuffer_texture_2d(&mut self, texture: TextureId) {
        match self.bound.framebuffer.and_then(|fb| self.objects.framebuffers.get_mut(&fb)) {
            Some(fb) => fb.color = Some(texture),
            None => log::error!("framebuffer_texture_2d on the default framebuffer"),
        }
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        let id = RenderbufferId(self.objects.name());
        self.objects.renderbuffers.insert(id, RenderbufferObject::default());
        Ok(id)
    }

    fn renderbuffer_storage(&mut self, renderbuffer: RenderbufferId, width: u32, height: u32) {
        let device = &self.gpu.device;
        match self.objects.renderbuffers.get_mut(&renderbuffer) {
            Some(rb) if width > 0 && height > 0 => rb.allocate(device, width, height),
            Some(_) => log::error!("zero-sized renderbuffer storage"),
            None => log::error!("storage for unknown renderbuffer {renderbuffer:?}"),
        }
    }

    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        match self.bound.framebuffer.and_then(|fb| self.objects.framebuffers.get_mut(&fb)) {
            Some(fb) => fb.depth_stencil = Some(renderbuffer),
            None => log::error!("framebuffer_renderbuffer on the default framebuffer"),
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        let Some(fb) = self.bound.framebuffer.and_then(|fb| self.objects.framebuffers.get(&fb)) else {
            return FramebufferStatus::Complete;
        };

        let color = fb
            .color
            .and_then(|t| self.objects.textures.get(&t))
            .map(|t| AttachmentInfo {
                width: t.width,
                height: t.height,
                allocated: t.texture.is_some(),
                renderable: true,
            });
        let depth_stencil = fb
            .depth_stencil
            .and_then(|rb| self.objects.renderbuffers.get(&rb))
            .map(|rb| AttachmentInfo {
                width: rb.width,
                height: rb.height,
                allocated: rb.view.is_some(),
                renderable: true,
            });

        framebuffer_completeness(color, depth_stencil)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.objects.framebuffers.remove(&framebuffer);
        if self.bound.framebuffer == Some(framebuffer) {
            self.bound.framebuffer = None;
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.objects.renderbuffers.remove(&renderbuffer);
    }

    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        let id = ProgramId(self.objects.name());
        self.objects.programs.insert(id, ProgramObject::new(&self.gpu.device, program));
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.objects.programs.remove(&program);
        self.pipelines.forget_program(program);
        if self.bound.program == Some(program) {
            self.bound.program = None;
        }
    }

    fn uniform_block(&mut self, data: &[u8]) {
        let Some(program) = self.bound.program.and_then(|p| self.objects.programs.get_mut(&p)) else {
            log::error!("uniform block without a program in use");
            return;
        };
        program.write_uniforms(&self.gpu.device, &self.gpu.queue, data);
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }
        let id = BufferId(self.objects.name());
        self.objects.buffers.insert(id, BufferObject { buffer: None, size: 0 });
        Ok(id)
    }

    fn buffer_data(&mut self, target: BufferTarget, data: BufferData<'_>, _usage: BufferUsage) {
        let device = self.gpu.device.clone();
        match self.bound_buffer(target) {
            Some(buffer) => buffer.allocate(&device, data),
            None => log::error!("buffer_data with no {target:?} buffer bound"),
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let queue = self.gpu.queue.clone();
        let Some(buffer) = self.bound_buffer(target) else {
            log::error!("buffer_sub_data with no {target:?} buffer bound");
            return;
        };
        let Some(raw) = &buffer.buffer else {
            log::error!("buffer_sub_data into a buffer without storage");
            return;
        };

        let end = objects::align4((offset + data.len()) as u64);
        if offset % 4 != 0 || end > buffer.size {
            log::error!(
                "buffer_sub_data {}..{} outside a {} byte buffer (or unaligned)",
                offset,
                offset + data.len(),
                buffer.size
            );
            return;
        }

        if data.len() % 4 == 0 {
            queue.write_buffer(raw, offset as u64, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(objects::align4(data.len() as u64) as usize, 0);
            queue.write_buffer(raw, offset as u64, &padded);
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.objects.buffers.remove(&buffer);
        if self.bound.vertex_buffer == Some(buffer) {
            self.bound.vertex_buffer = None;
        }
        if self.bound.index_buffer == Some(buffer) {
            self.bound.index_buffer = None;
        }
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        if count > 0 {
            self.draw(topology, first..first + count, false);
        }
    }

    fn draw_elements(&mut self, topology: Topology, count: u32, first_index: u32) {
        if count > 0 {
            self.draw(topology, first_index..first_index + count, true);
        }
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        if self.gpu.is_lost() {
            return Err(RenderError::ContextLost);
        }

        let texture = match self.bound.framebuffer {
            None => {
                if !self.gpu.surface_readable() {
                    return Err(RenderError::Readback("surface does not support readback".into()));
                }
                self.frame.as_ref().map(|(frame, _)| frame.texture.clone())
            }
            Some(fb) => self
                .objects
                .framebuffers
                .get(&fb)
                .and_then(|fb| fb.color)
                .and_then(|t| self.objects.textures.get(&t))
                .and_then(|t| t.texture.clone()),
        };
        let Some(texture) = texture else {
            return Err(RenderError::Readback("no readable render target bound".into()));
        };

        let past = |start: u32, len: u32, limit: u32| start.checked_add(len).is_none_or(|end| end > limit);
        if past(x, width, texture.width()) || past(y, height, texture.height()) || width == 0 || height == 0 {
            return Err(RenderError::Readback(format!(
                "area {x},{y} {width}x{height} outside the {}x{} target",
                texture.width(),
                texture.height()
            )));
        }

        readback::read_texture(&self.gpu.device, &self.gpu.queue, &texture, (x, y), (width, height))
    }
}
