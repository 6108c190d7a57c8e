use std::collections::HashMap;

use super::shader::{LinkedProgram, ProgramInterface};
use super::types::*;
use super::GlContext;
use crate::error::{RenderError, Result};

/// One recorded context call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    BeginFrame,
    EndFrame,
    ResizeDrawingBuffer(u32, u32),
    Enable(Capability),
    Disable(Capability),
    Viewport(i32, i32, i32, i32),
    Scissor(i32, i32, i32, i32),
    ClearColor([f32; 4]),
    Clear(ClearFlags),
    BlendEquation(BlendEquation),
    BlendEquationSeparate(BlendEquation, BlendEquation),
    BlendFunc(BlendFactor, BlendFactor),
    BlendFuncSeparate(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    ActiveTexture(usize),
    BindTexture(Option<TextureId>),
    BindFramebuffer(Option<FramebufferId>),
    UseProgram(Option<ProgramId>),
    BindBuffer(BufferTarget, Option<BufferId>),
    VertexLayout(u32),
    CreateTexture(TextureId),
    TexParameters(TextureParams),
    TexImage2D { width: u32, height: u32, has_pixels: bool, premultiply_alpha: bool },
    DeleteTexture(TextureId),
    CreateFramebuffer(FramebufferId),
    FramebufferTexture2D(TextureId),
    CreateRenderbuffer(RenderbufferId),
    RenderbufferStorage(RenderbufferId, u32, u32),
    FramebufferRenderbuffer(RenderbufferId),
    DeleteFramebuffer(FramebufferId),
    DeleteRenderbuffer(RenderbufferId),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    UniformBlock(usize),
    CreateBuffer(BufferId),
    BufferData { target: BufferTarget, len: usize, usage: BufferUsage },
    BufferSubData { target: BufferTarget, offset: usize, len: usize },
    DeleteBuffer(BufferId),
    DrawArrays { topology: Topology, first: u32, count: u32 },
    DrawElements { topology: Topology, count: u32, first_index: u32 },
    ReadPixels(u32, u32, u32, u32),
}

#[derive(Debug, Clone)]
struct HeadlessTexture {
    width: u32,
    height: u32,
    allocated: bool,
    params: TextureParams,
    /// Last clear color while attached to the bound framebuffer.
    fill: [f32; 4],
}

#[derive(Debug, Clone, Default)]
struct HeadlessFramebuffer {
    color: Option<TextureId>,
    depth_stencil: Option<RenderbufferId>,
}

/// In-memory context that validates and records calls without rasterizing.
///
/// Misuse that a GL context would report as an error (drawing without a
/// program, out-of-range buffer writes, binding deleted objects) is logged
/// and collected in [`HeadlessContext::errors`].
#[derive(Debug)]
pub struct HeadlessContext {
    calls: Vec<GlCall>,
    errors: Vec<String>,
    lost: bool,
    frame_available: bool,
    next_name: u32,

    width: u32,
    height: u32,
    max_texture_units: usize,
    max_texture_size: u32,

    active_unit: usize,
    units: Vec<Option<TextureId>>,
    framebuffer: Option<FramebufferId>,
    program: Option<ProgramId>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    layout_stride: Option<u32>,

    clear_color: [f32; 4],
    default_fill: [f32; 4],
    scissor_enabled: bool,

    textures: HashMap<TextureId, HeadlessTexture>,
    framebuffers: HashMap<FramebufferId, HeadlessFramebuffer>,
    renderbuffers: HashMap<RenderbufferId, Option<(u32, u32)>>,
    programs: HashMap<ProgramId, ProgramInterface>,
    buffers: HashMap<BufferId, usize>,
}

impl HeadlessContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Vec::new(),
            errors: Vec::new(),
            lost: false,
            frame_available: true,
            next_name: 1,
            width,
            height,
            max_texture_units: 16,
            max_texture_size: 4096,
            active_unit: 0,
            units: vec![None; 16],
            framebuffer: None,
            program: None,
            vertex_buffer: None,
            index_buffer: None,
            layout_stride: None,
            clear_color: [0.0; 4],
            default_fill: [0.0; 4],
            scissor_enabled: false,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count_calls(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn bound_texture(&self, unit: usize) -> Option<TextureId> {
        self.units.get(unit).copied().flatten()
    }

    pub fn texture_params(&self, texture: TextureId) -> Option<TextureParams> {
        self.textures.get(&texture).map(|t| t.params)
    }

    pub fn scissor_enabled(&self) -> bool {
        self.scissor_enabled
    }

    // ── fault injection ───────────────────────────────────────────────────

    /// Simulates the platform dropping the context.
    pub fn lose_context(&mut self) {
        log::debug!("headless context: simulated loss");
        self.lost = true;
    }

    /// Makes `begin_frame` report that no frame is available.
    pub fn set_frame_available(&mut self, available: bool) {
        self.frame_available = available;
    }

    pub fn set_max_texture_units(&mut self, units: usize) {
        self.max_texture_units = units;
        self.units.resize(units, None);
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn record(&mut self, call: GlCall) -> bool {
        if self.lost {
            return false;
        }
        self.calls.push(call);
        true
    }

    fn error(&mut self, message: String) {
        log::warn!("headless context: {message}");
        self.errors.push(message);
    }

    fn name(&mut self) -> Result<u32> {
        if self.lost {
            return Err(RenderError::ContextLost);
        }
        let n = self.next_name;
        self.next_name += 1;
        Ok(n)
    }

    fn bound_texture_mut(&mut self) -> Option<&mut HeadlessTexture> {
        let id = self.units.get(self.active_unit).copied().flatten()?;
        self.textures.get_mut(&id)
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Vertex => self.vertex_buffer,
            BufferTarget::Index => self.index_buffer,
        }
    }

    fn target_size(&self) -> (u32, u32) {
        self.framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .and_then(|fb| fb.color)
            .and_then(|tex| self.textures.get(&tex))
            .map_or((self.width, self.height), |t| (t.width, t.height))
    }

    fn attachment(&self, texture: TextureId) -> Option<AttachmentInfo> {
        self.textures.get(&texture).map(|t| AttachmentInfo {
            width: t.width,
            height: t.height,
            allocated: t.allocated,
            renderable: true,
        })
    }

    fn validate_draw(&mut self, vertices: u32) {
        match self.program {
            None => self.error("draw without a program in use".into()),
            Some(p) if !self.programs.contains_key(&p) => {
                self.error(format!("draw with deleted program {p:?}"))
            }
            Some(_) => {}
        }

        let Some(vb) = self.vertex_buffer else {
            self.error("draw without a vertex buffer bound".into());
            return;
        };
        let Some(stride) = self.layout_stride else {
            self.error("draw without a vertex layout".into());
            return;
        };
        let len = self.buffers.get(&vb).copied().unwrap_or(0);
        if (vertices as usize) * (stride as usize) > len {
            self.error(format!(
                "draw reads {vertices} vertices of {stride} bytes from a {len} byte buffer"
            ));
        }
    }
}

impl GlContext for HeadlessContext {
    fn is_context_lost(&self) -> bool {
        self.lost
    }

    fn restore(&mut self) -> Result<()> {
        let (width, height) = (self.width, self.height);
        let units = self.max_texture_units;
        let calls = std::mem::take(&mut self.calls);
        let errors = std::mem::take(&mut self.errors);

        *self = HeadlessContext::new(width, height);
        self.set_max_texture_units(units);
        self.calls = calls;
        self.errors = errors;
        log::debug!("headless context: restored");
        Ok(())
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize_drawing_buffer(&mut self, width: u32, height: u32) {
        if self.record(GlCall::ResizeDrawingBuffer(width, height)) {
            self.width = width;
            self.height = height;
        }
    }

    fn max_texture_units(&self) -> usize {
        self.max_texture_units
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn begin_frame(&mut self) -> Result<bool> {
        if self.lost {
            return Err(RenderError::ContextLost);
        }
        self.record(GlCall::BeginFrame);
        Ok(self.frame_available)
    }

    fn end_frame(&mut self) {
        self.record(GlCall::EndFrame);
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        let call = if enabled { GlCall::Enable(capability) } else { GlCall::Disable(capability) };
        if self.record(call) && capability == Capability::ScissorTest {
            self.scissor_enabled = enabled;
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport(x, y, width, height));
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if self.record(GlCall::Scissor(x, y, width, height)) && (width < 0 || height < 0) {
            self.error(format!("negative scissor size {width}x{height}"));
        }
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        if self.record(GlCall::ClearColor(rgba)) {
            self.clear_color = rgba;
        }
    }

    fn clear(&mut self, flags: ClearFlags) {
        if !self.record(GlCall::Clear(flags)) || !flags.color {
            return;
        }
        let color = self.clear_color;
        let attached = self
            .framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .and_then(|fb| fb.color);
        match attached {
            Some(tex) => {
                if let Some(t) = self.textures.get_mut(&tex) {
                    t.fill = color;
                }
            }
            None => self.default_fill = color,
        }
    }

    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation) {
        self.record(GlCall::BlendEquationSeparate(color, alpha));
    }

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(GlCall::BlendFuncSeparate(src_rgb, dst_rgb, src_alpha, dst_alpha));
    }

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.record(GlCall::BlendEquation(equation));
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.record(GlCall::BlendFunc(src, dst));
    }

    fn active_texture(&mut self, unit: usize) {
        if !self.record(GlCall::ActiveTexture(unit)) {
            return;
        }
        if unit >= self.max_texture_units {
            self.error(format!("texture unit {unit} out of range"));
            return;
        }
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        if !self.record(GlCall::BindTexture(texture)) {
            return;
        }
        if let Some(t) = texture.filter(|t| !self.textures.contains_key(t)) {
            self.error(format!("bind of unknown texture {t:?}"));
        }
        let unit = self.active_unit;
        self.units[unit] = texture;
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if self.record(GlCall::BindFramebuffer(framebuffer)) {
            self.framebuffer = framebuffer;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        if self.record(GlCall::UseProgram(program)) {
            self.program = program;
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        if !self.record(GlCall::BindBuffer(target, buffer)) {
            return;
        }
        match target {
            BufferTarget::Vertex => self.vertex_buffer = buffer,
            BufferTarget::Index => self.index_buffer = buffer,
        }
    }

    fn vertex_layout(&mut self, layout: &VertexLayout) {
        if self.record(GlCall::VertexLayout(layout.stride)) {
            self.layout_stride = Some(layout.stride);
        }
    }

    fn create_texture(&mut self) -> Result<TextureId> {
        let id = TextureId(self.name()?);
        self.textures.insert(
            id,
            HeadlessTexture {
                width: 0,
                height: 0,
                allocated: false,
                params: TextureParams::default(),
                fill: [0.0; 4],
            },
        );
        self.record(GlCall::CreateTexture(id));
        Ok(id)
    }

    fn tex_parameters(&mut self, params: TextureParams) {
        if !self.record(GlCall::TexParameters(params)) {
            return;
        }
        match self.bound_texture_mut() {
            Some(t) => t.params = params,
            None => self.error("tex_parameters without a bound texture".into()),
        }
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) -> Result<()> {
        if self.lost {
            return Err(RenderError::ContextLost);
        }
        self.record(GlCall::TexImage2D {
            width: image.width,
            height: image.height,
            has_pixels: image.pixels.is_some(),
            premultiply_alpha: image.premultiply_alpha,
        });

        let expected = image.width as usize * image.height as usize * image.format.bytes_per_pixel();
        if let Some(len) = image.pixels.map(<[u8]>::len).filter(|&len| len < expected) {
            return Err(RenderError::Readback(format!(
                "texture upload of {len} bytes, expected {expected}"
            )));
        }

        let max = self.max_texture_size;
        match self.bound_texture_mut() {
            Some(t) => {
                t.width = image.width;
                t.height = image.height;
                t.allocated = image.width > 0 && image.height > 0 && image.width <= max && image.height <= max;
                Ok(())
            }
            None => {
                self.error("tex_image_2d without a bound texture".into());
                Ok(())
            }
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if !self.record(GlCall::DeleteTexture(texture)) {
            return;
        }
        self.textures.remove(&texture);
        for unit in &mut self.units {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId> {
        let id = FramebufferId(self.name()?);
        self.framebuffers.insert(id, HeadlessFramebuffer::default());
        self.record(GlCall::CreateFramebuffer(id));
        Ok(id)
    }

    fn framebuffer_texture_2d(&mut self, texture: TextureId) {
        if !self.record(GlCall::FramebufferTexture2D(texture)) {
            return;
        }
        match self.framebuffer.and_then(|fb| self.framebuffers.get_mut(&fb)) {
            Some(fb) => fb.color = Some(texture),
            None => self.error("framebuffer_texture_2d on the default framebuffer".into()),
        }
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId> {
        let id = RenderbufferId(self.name()?);
        self.renderbuffers.insert(id, None);
        self.record(GlCall::CreateRenderbuffer(id));
        Ok(id)
    }

    fn renderbuffer_storage(&mut self, renderbuffer: RenderbufferId, width: u32, height: u32) {
        if !self.record(GlCall::RenderbufferStorage(renderbuffer, width, height)) {
            return;
        }
        match self.renderbuffers.get_mut(&renderbuffer) {
            Some(storage) => *storage = Some((width, height)),
            None => self.error(format!("storage for unknown renderbuffer {renderbuffer:?}")),
        }
    }

    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if !self.record(GlCall::FramebufferRenderbuffer(renderbuffer)) {
            return;
        }
        match self.framebuffer.and_then(|fb| self.framebuffers.get_mut(&fb)) {
            Some(fb) => fb.depth_stencil = Some(renderbuffer),
            None => self.error("framebuffer_renderbuffer on the default framebuffer".into()),
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        let Some(fb) = self.framebuffer.and_then(|fb| self.framebuffers.get(&fb)) else {
            return FramebufferStatus::Complete;
        };

        let color = fb.color.and_then(|t| self.attachment(t));
        let depth = fb.depth_stencil.map(|rb| match self.renderbuffers.get(&rb).copied().flatten() {
            Some((width, height)) => AttachmentInfo { width, height, allocated: true, renderable: true },
            None => AttachmentInfo { width: 0, height: 0, allocated: false, renderable: true },
        });

        framebuffer_completeness(color, depth)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if !self.record(GlCall::DeleteFramebuffer(framebuffer)) {
            return;
        }
        self.framebuffers.remove(&framebuffer);
        if self.framebuffer == Some(framebuffer) {
            self.framebuffer = None;
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        if self.record(GlCall::DeleteRenderbuffer(renderbuffer)) {
            self.renderbuffers.remove(&renderbuffer);
        }
    }

    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId> {
        let id = ProgramId(self.name()?);
        self.programs.insert(id, program.interface.clone());
        self.record(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if !self.record(GlCall::DeleteProgram(program)) {
            return;
        }
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn uniform_block(&mut self, data: &[u8]) {
        if !self.record(GlCall::UniformBlock(data.len())) {
            return;
        }
        match self.program.and_then(|p| self.programs.get(&p)) {
            Some(interface) if !interface.uniforms => {
                self.error("uniform block for a program without uniforms".into())
            }
            Some(_) => {}
            None => self.error("uniform block without a program in use".into()),
        }
    }

    fn create_buffer(&mut self) -> Result<BufferId> {
        let id = BufferId(self.name()?);
        self.buffers.insert(id, 0);
        self.record(GlCall::CreateBuffer(id));
        Ok(id)
    }

    fn buffer_data(&mut self, target: BufferTarget, data: BufferData<'_>, usage: BufferUsage) {
        if !self.record(GlCall::BufferData { target, len: data.len(), usage }) {
            return;
        }
        match self.bound_buffer(target).and_then(|b| self.buffers.get_mut(&b)) {
            Some(len) => *len = data.len(),
            None => self.error(format!("buffer_data with no {target:?} buffer bound")),
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        if !self.record(GlCall::BufferSubData { target, offset, len: data.len() }) {
            return;
        }
        let len = self.bound_buffer(target).and_then(|b| self.buffers.get(&b)).copied();
        match len {
            Some(len) if offset + data.len() <= len => {}
            Some(len) => self.error(format!(
                "buffer_sub_data writes {}..{} past a {len} byte buffer",
                offset,
                offset + data.len()
            )),
            None => self.error(format!("buffer_sub_data with no {target:?} buffer bound")),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if !self.record(GlCall::DeleteBuffer(buffer)) {
            return;
        }
        self.buffers.remove(&buffer);
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        if self.index_buffer == Some(buffer) {
            self.index_buffer = None;
        }
    }

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32) {
        if self.record(GlCall::DrawArrays { topology, first, count }) {
            self.validate_draw(first + count);
        }
    }

    fn draw_elements(&mut self, topology: Topology, count: u32, first_index: u32) {
        if !self.record(GlCall::DrawElements { topology, count, first_index }) {
            return;
        }
        let index_len = self.index_buffer.and_then(|b| self.buffers.get(&b)).copied();
        match index_len {
            Some(len) if (first_index + count) as usize * 2 <= len => {}
            Some(len) => self.error(format!("draw_elements reads past a {len} byte index buffer")),
            None => self.error("draw_elements without an index buffer".into()),
        }
        self.validate_draw(0);
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        if self.lost {
            return Err(RenderError::ContextLost);
        }
        self.record(GlCall::ReadPixels(x, y, width, height));

        let (tw, th) = self.target_size();
        let past = |start: u32, len: u32, limit: u32| start.checked_add(len).is_none_or(|end| end > limit);
        if past(x, width, tw) || past(y, height, th) {
            return Err(RenderError::Readback(format!(
                "area {x},{y} {width}x{height} outside the {tw}x{th} target"
            )));
        }

        let fill = self
            .framebuffer
            .and_then(|fb| self.framebuffers.get(&fb))
            .and_then(|fb| fb.color)
            .and_then(|tex| self.textures.get(&tex))
            .map_or(self.default_fill, |t| t.fill);
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let pixel = [q(fill[0]), q(fill[1]), q(fill[2]), q(fill[3])];

        Ok(pixel.repeat(width as usize * height as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_context_records_nothing_and_refuses_creation() {
        let mut gl = HeadlessContext::new(4, 4);
        gl.lose_context();
        gl.viewport(0, 0, 4, 4);
        assert!(gl.calls().is_empty());
        assert!(matches!(gl.create_texture(), Err(RenderError::ContextLost)));

        gl.restore().unwrap();
        assert!(!gl.is_context_lost());
        assert!(gl.create_texture().is_ok());
    }

    #[test]
    fn read_pixels_returns_clear_color_of_target() {
        let mut gl = HeadlessContext::new(2, 2);
        gl.clear_color([1.0, 0.0, 0.0, 1.0]);
        gl.clear(ClearFlags::ALL);
        let pixels = gl.read_pixels(0, 0, 2, 1).unwrap();
        assert_eq!(pixels, vec![255, 0, 0, 255, 255, 0, 0, 255]);
        assert!(gl.read_pixels(1, 1, 2, 2).is_err());
    }

    #[test]
    fn sub_data_past_end_is_reported() {
        let mut gl = HeadlessContext::new(2, 2);
        let b = gl.create_buffer().unwrap();
        gl.bind_buffer(BufferTarget::Vertex, Some(b));
        gl.buffer_data(BufferTarget::Vertex, BufferData::Size(8), BufferUsage::Stream);
        gl.buffer_sub_data(BufferTarget::Vertex, 4, &[0; 8]);
        assert_eq!(gl.errors().len(), 1);
    }

    #[test]
    fn unallocated_color_attachment_is_incomplete() {
        let mut gl = HeadlessContext::new(2, 2);
        let tex = gl.create_texture().unwrap();
        let fb = gl.create_framebuffer().unwrap();
        gl.bind_framebuffer(Some(fb));
        gl.framebuffer_texture_2d(tex);
        assert_eq!(gl.check_framebuffer_status(), FramebufferStatus::IncompleteAttachment);
    }
}
