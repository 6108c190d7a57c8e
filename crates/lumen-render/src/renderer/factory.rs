//! GPU resource creation and release.
//!
//! The `RenderCore` methods bind through the tracker and therefore change
//! cached bindings; they do not flush. Callers with an open batch use the
//! `Renderer` wrappers, which flush first.

use image::RgbaImage;

use super::{RenderCore, Renderer};
use crate::context::{
    shader, BufferData, BufferTarget, BufferUsage, FramebufferStatus, GlContext, TexImage,
    TextureFilter, TextureParams, TextureWrap,
};
use crate::error::{RenderError, Result, ShaderStage};
use crate::resources::{
    is_power_of_two, BufferHandle, BufferInit, Framebuffer, FramebufferHandle, GpuBuffer,
    NativeTexture, Program, ProgramHandle, ScaleMode, TextureDescriptor, TextureHandle,
};

fn noop<T>(_: &mut T) {}

impl<G: GlContext> RenderCore<G> {
    /// Creates a texture from an image, or an empty `width × height` one.
    ///
    /// Wrapping repeats for power-of-two sizes and clamps otherwise;
    /// filtering is linear only for [`ScaleMode::Linear`] with antialiasing
    /// on and pixel art off.
    pub fn create_texture_from_source(
        &mut self,
        source: Option<&RgbaImage>,
        width: u32,
        height: u32,
        scale_mode: ScaleMode,
    ) -> Result<TextureHandle> {
        let (width, height) = source.map_or((width, height), |img| img.dimensions());
        let desc = TextureDescriptor {
            pixels: source.map(|img| img.as_raw().as_slice()),
            ..TextureDescriptor::new(width, height)
                .with_filter(self.source_filter(scale_mode))
                .with_wrap(source_wrap(width, height))
        };
        self.create_texture_2d(desc)
    }

    fn source_filter(&self, scale_mode: ScaleMode) -> TextureFilter {
        let linear = scale_mode == ScaleMode::Linear && self.config.antialias && !self.config.pixel_art;
        if linear { TextureFilter::Linear } else { TextureFilter::Nearest }
    }

    /// Creates a texture with explicit parameters. It is bound on unit 0
    /// while uploading and unbound afterwards.
    pub fn create_texture_2d(&mut self, desc: TextureDescriptor<'_>) -> Result<TextureHandle> {
        self.ensure_active()?;

        let max = self.gl.max_texture_size();
        if desc.width > max || desc.height > max {
            log::warn!("texture {}x{} exceeds the maximum size {max}", desc.width, desc.height);
        }

        let raw = self.gl.create_texture()?;
        let handle = self.textures.insert(NativeTexture {
            raw,
            width: desc.width,
            height: desc.height,
            premultiplied_alpha: desc.premultiply_alpha,
            render_texture: false,
            flip_y: desc.flip_y,
            params: desc.params(),
        });

        self.set_texture_2d(Some(handle), 0, noop);
        self.gl.tex_parameters(desc.params());
        let upload = self.gl.tex_image_2d(TexImage {
            mip_level: desc.mip_level,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            pixels: desc.pixels,
            premultiply_alpha: desc.premultiply_alpha,
            flip_y: desc.flip_y,
        });
        self.set_texture_2d(None, 0, noop);

        if let Err(err) = upload {
            self.delete_texture(handle);
            return Err(err);
        }

        log::debug!("created texture {handle:?} ({}x{})", desc.width, desc.height);
        Ok(handle)
    }

    /// Re-uploads `image` into `texture`, or creates a new texture when the
    /// handle is `None` or stale.
    pub fn update_texture(
        &mut self,
        texture: Option<TextureHandle>,
        image: &RgbaImage,
        scale_mode: ScaleMode,
    ) -> Result<TextureHandle> {
        let Some(handle) = texture.filter(|&h| self.textures.contains(h)) else {
            return self.create_texture_from_source(Some(image), 0, 0, scale_mode);
        };
        self.ensure_active()?;

        let (width, height) = image.dimensions();
        let flip_y = self.textures.get(handle).is_some_and(|t| t.flip_y);

        self.set_texture_2d(Some(handle), 0, noop);
        let upload = self.gl.tex_image_2d(TexImage {
            mip_level: 0,
            format: crate::context::PixelFormat::Rgba8,
            width,
            height,
            pixels: Some(image.as_raw()),
            premultiply_alpha: true,
            flip_y,
        });
        self.set_texture_2d(None, 0, noop);
        upload?;

        if let Some(t) = self.textures.get_mut(handle) {
            t.width = width;
            t.height = height;
            t.premultiplied_alpha = true;
        }
        Ok(handle)
    }

    /// Changes min and mag filtering of `texture`, keeping its wrapping.
    pub fn set_texture_filter(&mut self, texture: TextureHandle, filter: TextureFilter) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(params) = self.textures.get(texture).map(|t| TextureParams {
            min_filter: filter,
            mag_filter: filter,
            ..t.params
        }) else {
            return false;
        };

        self.set_texture_2d(Some(texture), 0, noop);
        self.gl.tex_parameters(params);
        self.set_texture_2d(None, 0, noop);

        if let Some(t) = self.textures.get_mut(texture) {
            t.params = params;
        }
        true
    }

    /// Creates a framebuffer rendering into `render_texture`, optionally
    /// with a combined `width × height` depth-stencil renderbuffer.
    ///
    /// Fails with the decoded status when the framebuffer is incomplete;
    /// nothing created here survives a failure.
    pub fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        render_texture: TextureHandle,
        add_depth_stencil: bool,
    ) -> Result<FramebufferHandle> {
        self.ensure_active()?;
        let texture_raw = self
            .textures
            .get(render_texture)
            .map(|t| t.raw)
            .ok_or(RenderError::InvalidHandle("texture"))?;

        let raw = self.gl.create_framebuffer()?;
        let handle = self.framebuffers.insert(Framebuffer {
            raw,
            render_texture,
            depth_stencil: None,
            width,
            height,
        });

        self.set_framebuffer(Some(handle), noop);
        self.gl.framebuffer_texture_2d(texture_raw);

        let status = match self.attach_depth_stencil(handle, width, height, add_depth_stencil) {
            Ok(()) => self.gl.check_framebuffer_status(),
            Err(err) => {
                self.set_framebuffer(None, noop);
                self.delete_framebuffer(handle);
                return Err(err);
            }
        };

        self.set_framebuffer(None, noop);

        if status != FramebufferStatus::Complete {
            self.delete_framebuffer(handle);
            return Err(RenderError::FramebufferIncomplete(status));
        }

        if let Some(t) = self.textures.get_mut(render_texture) {
            t.render_texture = true;
            t.premultiplied_alpha = false;
        }
        log::debug!("created framebuffer {handle:?} ({width}x{height}, depth-stencil: {add_depth_stencil})");
        Ok(handle)
    }

    fn attach_depth_stencil(
        &mut self,
        framebuffer: FramebufferHandle,
        width: u32,
        height: u32,
        enabled: bool,
    ) -> Result<()> {
        if !enabled {
            return Ok(());
        }
        let rb = self.gl.create_renderbuffer()?;
        if let Some(fb) = self.framebuffers.get_mut(framebuffer) {
            fb.depth_stencil = Some(rb);
        }
        self.gl.renderbuffer_storage(rb, width, height);
        self.gl.framebuffer_renderbuffer(rb);
        Ok(())
    }

    /// Compiles, links and creates a program from WGSL sources.
    pub fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<ProgramHandle> {
        self.ensure_active()?;

        let vertex = shader::compile(ShaderStage::Vertex, vertex_source)?;
        let fragment = shader::compile(ShaderStage::Fragment, fragment_source)?;
        let linked = shader::link(vertex, fragment)?;

        let raw = self.gl.create_program(&linked)?;
        let handle = self.programs.insert(Program { raw, interface: linked.interface });
        log::debug!("created program {handle:?}");
        Ok(handle)
    }

    pub fn create_vertex_buffer(&mut self, init: BufferInit<'_>, usage: BufferUsage) -> Result<BufferHandle> {
        self.create_buffer(BufferTarget::Vertex, init, usage)
    }

    pub fn create_index_buffer(&mut self, init: BufferInit<'_>, usage: BufferUsage) -> Result<BufferHandle> {
        self.create_buffer(BufferTarget::Index, init, usage)
    }

    fn create_buffer(
        &mut self,
        target: BufferTarget,
        init: BufferInit<'_>,
        usage: BufferUsage,
    ) -> Result<BufferHandle> {
        self.ensure_active()?;

        let (data, size) = match init {
            BufferInit::Data(bytes) => (BufferData::Bytes(bytes), bytes.len()),
            BufferInit::Size(size) => (BufferData::Size(size), size),
        };

        let raw = self.gl.create_buffer()?;
        let handle = self.buffers.insert(GpuBuffer { raw, target, size, usage });

        match target {
            BufferTarget::Vertex => self.set_vertex_buffer(Some(handle), noop),
            BufferTarget::Index => self.set_index_buffer(Some(handle), noop),
        };
        self.gl.buffer_data(target, data, usage);
        match target {
            BufferTarget::Vertex => self.set_vertex_buffer(None, noop),
            BufferTarget::Index => self.set_index_buffer(None, noop),
        };

        log::debug!("created {target:?} buffer {handle:?} ({size} bytes)");
        Ok(handle)
    }

    /// Releases a texture. `false` for stale handles.
    pub fn delete_texture(&mut self, texture: TextureHandle) -> bool {
        let Some(t) = self.textures.remove(texture) else { return false };
        self.state.forget_texture(texture);
        if self.blank_texture == Some(texture) {
            self.blank_texture = None;
        }
        if self.is_active() {
            self.gl.delete_texture(t.raw);
        }
        true
    }

    /// Releases a framebuffer and its depth-stencil renderbuffer. The render
    /// texture is left alone.
    pub fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) -> bool {
        let Some(fb) = self.framebuffers.remove(framebuffer) else { return false };
        self.state.forget_framebuffer(framebuffer);
        if self.is_active() {
            if let Some(rb) = fb.depth_stencil {
                self.gl.delete_renderbuffer(rb);
            }
            self.gl.delete_framebuffer(fb.raw);
        }
        true
    }

    pub fn delete_program(&mut self, program: ProgramHandle) -> bool {
        let Some(p) = self.programs.remove(program) else { return false };
        self.state.forget_program(program);
        if self.is_active() {
            self.gl.delete_program(p.raw);
        }
        true
    }

    pub fn delete_buffer(&mut self, buffer: BufferHandle) -> bool {
        let Some(b) = self.buffers.remove(buffer) else { return false };
        self.state.forget_buffer(buffer);
        if self.is_active() {
            self.gl.delete_buffer(b.raw);
        }
        true
    }

    /// Texture units usable by batching pipelines.
    pub fn max_textures(&self) -> usize {
        self.config.max_textures.min(self.gl.max_texture_units()).max(1)
    }

    pub fn max_texture_size(&self) -> u32 {
        self.gl.max_texture_size()
    }

    pub(crate) fn create_blank_texture(&mut self) -> Result<TextureHandle> {
        let desc = TextureDescriptor::new(1, 1)
            .with_pixels(&[255, 255, 255, 255])
            .with_filter(TextureFilter::Nearest);
        let handle = self.create_texture_2d(desc)?;
        self.blank_texture = Some(handle);
        Ok(handle)
    }

    /// Forgets every resource without touching the context. Used when the
    /// context was lost and its objects are gone.
    pub(crate) fn invalidate_resources(&mut self) {
        self.textures.invalidate_all();
        self.framebuffers.invalidate_all();
        self.programs.invalidate_all();
        self.buffers.invalidate_all();
        self.blank_texture = None;
    }

    /// Deletes every resource on the context.
    pub(crate) fn delete_all_resources(&mut self) {
        let active = self.is_active();
        for fb in self.framebuffers.drain() {
            if active {
                if let Some(rb) = fb.depth_stencil {
                    self.gl.delete_renderbuffer(rb);
                }
                self.gl.delete_framebuffer(fb.raw);
            }
        }
        for t in self.textures.drain() {
            if active {
                self.gl.delete_texture(t.raw);
            }
        }
        for p in self.programs.drain() {
            if active {
                self.gl.delete_program(p.raw);
            }
        }
        for b in self.buffers.drain() {
            if active {
                self.gl.delete_buffer(b.raw);
            }
        }
        self.blank_texture = None;
    }
}

fn source_wrap(width: u32, height: u32) -> TextureWrap {
    if is_power_of_two(width, height) { TextureWrap::Repeat } else { TextureWrap::ClampToEdge }
}

impl<G: GlContext> Renderer<G> {
    pub fn create_texture_from_source(
        &mut self,
        source: Option<&RgbaImage>,
        width: u32,
        height: u32,
        scale_mode: ScaleMode,
    ) -> Result<TextureHandle> {
        self.flush();
        self.core.create_texture_from_source(source, width, height, scale_mode)
    }

    pub fn create_texture_2d(&mut self, desc: TextureDescriptor<'_>) -> Result<TextureHandle> {
        self.flush();
        self.core.create_texture_2d(desc)
    }

    pub fn update_texture(
        &mut self,
        texture: Option<TextureHandle>,
        image: &RgbaImage,
        scale_mode: ScaleMode,
    ) -> Result<TextureHandle> {
        self.flush();
        self.core.update_texture(texture, image, scale_mode)
    }

    pub fn set_texture_filter(&mut self, texture: TextureHandle, filter: TextureFilter) -> bool {
        self.flush();
        self.core.set_texture_filter(texture, filter)
    }

    pub fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        render_texture: TextureHandle,
        add_depth_stencil: bool,
    ) -> Result<FramebufferHandle> {
        self.flush();
        self.core.create_framebuffer(width, height, render_texture, add_depth_stencil)
    }

    pub fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<ProgramHandle> {
        self.flush();
        self.core.create_program(vertex_source, fragment_source)
    }

    pub fn create_vertex_buffer(&mut self, init: BufferInit<'_>, usage: BufferUsage) -> Result<BufferHandle> {
        self.flush();
        self.core.create_vertex_buffer(init, usage)
    }

    pub fn create_index_buffer(&mut self, init: BufferInit<'_>, usage: BufferUsage) -> Result<BufferHandle> {
        self.flush();
        self.core.create_index_buffer(init, usage)
    }

    pub fn delete_texture(&mut self, texture: TextureHandle) -> bool {
        self.flush();
        self.core.delete_texture(texture)
    }

    pub fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) -> bool {
        self.flush();
        self.core.delete_framebuffer(framebuffer)
    }

    pub fn delete_program(&mut self, program: ProgramHandle) -> bool {
        self.flush();
        self.core.delete_program(program)
    }

    pub fn delete_buffer(&mut self, buffer: BufferHandle) -> bool {
        self.flush();
        self.core.delete_buffer(buffer)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&NativeTexture> {
        self.core.texture(texture)
    }

    pub fn blank_texture(&self) -> Option<TextureHandle> {
        self.core.blank_texture
    }

    pub fn max_textures(&self) -> usize {
        self.core.max_textures()
    }

    pub fn max_texture_size(&self) -> u32 {
        self.core.max_texture_size()
    }
}
