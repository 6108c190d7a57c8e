//! Renderer-owned GPU objects and the handles that name them.

mod arena;

pub use arena::{Arena, Handle};

use crate::context::{
    BufferId, BufferTarget, BufferUsage, FramebufferId, PixelFormat, ProgramId, ProgramInterface,
    RenderbufferId, TextureFilter, TextureId, TextureParams, TextureWrap,
};

pub type TextureHandle = Handle<NativeTexture>;
pub type FramebufferHandle = Handle<Framebuffer>;
pub type ProgramHandle = Handle<Program>;
pub type BufferHandle = Handle<GpuBuffer>;

/// Filtering requested for a texture created from a source image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Clone)]
pub struct NativeTexture {
    pub raw: TextureId,
    pub width: u32,
    pub height: u32,
    pub premultiplied_alpha: bool,
    /// Color attachment of a framebuffer.
    pub render_texture: bool,
    pub flip_y: bool,
    pub params: TextureParams,
}

impl NativeTexture {
    pub fn is_power_of_two(&self) -> bool {
        is_power_of_two(self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub raw: FramebufferId,
    pub render_texture: TextureHandle,
    pub depth_stencil: Option<RenderbufferId>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub raw: ProgramId,
    pub interface: ProgramInterface,
}

#[derive(Debug, Clone)]
pub struct GpuBuffer {
    pub raw: BufferId,
    pub target: BufferTarget,
    pub size: usize,
    pub usage: BufferUsage,
}

/// Full parameter set of the low-level texture constructor.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub mip_level: u32,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub format: PixelFormat,
    /// Tightly packed rows; `None` allocates uninitialized storage.
    pub pixels: Option<&'a [u8]>,
    pub width: u32,
    pub height: u32,
    pub premultiply_alpha: bool,
    pub flip_y: bool,
}

impl<'a> TextureDescriptor<'a> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mip_level: 0,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            format: PixelFormat::Rgba8,
            pixels: None,
            width,
            height,
            premultiply_alpha: true,
            flip_y: false,
        }
    }

    pub fn with_pixels(mut self, pixels: &'a [u8]) -> Self {
        self.pixels = Some(pixels);
        self
    }

    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self
    }

    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    pub(crate) fn params(&self) -> TextureParams {
        TextureParams {
            min_filter: self.min_filter,
            mag_filter: self.mag_filter,
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
        }
    }
}

/// Initial contents of a vertex or index buffer.
#[derive(Debug, Copy, Clone)]
pub enum BufferInit<'a> {
    Data(&'a [u8]),
    Size(usize),
}

pub fn is_power_of_two(width: u32, height: u32) -> bool {
    width.is_power_of_two() && height.is_power_of_two()
}
