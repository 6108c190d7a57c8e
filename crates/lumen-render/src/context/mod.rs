//! The GPU context seam.
//!
//! [`GlContext`] is an immediate-mode, WebGL-shaped interface: bind points
//! (texture units, program, vertex/index buffer, framebuffer), fixed-function
//! state (blend, scissor, viewport) and object creation on typed names. The
//! renderer's state tracker sits on top of it and is the only caller.
//!
//! Implementations:
//! - [`HeadlessContext`]: validates and records every call, no rasterization
//! - [`WgpuContext`]: wgpu device + window surface

mod headless;
pub mod shader;
mod types;
mod wgpu_backend;

pub use headless::{GlCall, HeadlessContext};
pub use shader::{LinkedProgram, ProgramInterface};
pub use types::*;
pub use wgpu_backend::{WgpuContext, WgpuContextInit};

use crate::error::Result;

pub trait GlContext: 'static {
    // ── lifecycle ─────────────────────────────────────────────────────────

    /// `true` once the underlying device/context has been lost.
    fn is_context_lost(&self) -> bool;

    /// Re-acquires a context after loss. Every previously created object is
    /// gone afterwards.
    fn restore(&mut self) -> Result<()>;

    /// Size of the default framebuffer in device pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);

    fn resize_drawing_buffer(&mut self, width: u32, height: u32);

    fn max_texture_units(&self) -> usize;

    fn max_texture_size(&self) -> u32;

    /// Prepares the default framebuffer for a frame. `Ok(false)` means no
    /// frame is available and the frame should be skipped.
    fn begin_frame(&mut self) -> Result<bool>;

    /// Presents the default framebuffer.
    fn end_frame(&mut self);

    // ── fixed-function state ──────────────────────────────────────────────

    fn set_capability(&mut self, capability: Capability, enabled: bool);

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    /// Scissor rectangle with a bottom-left origin.
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);

    fn clear_color(&mut self, rgba: [f32; 4]);

    fn clear(&mut self, flags: ClearFlags);

    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation);

    fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );

    fn blend_equation(&mut self, equation: BlendEquation) {
        self.blend_equation_separate(equation, equation);
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_func_separate(src, dst, src, dst);
    }

    // ── bind points ───────────────────────────────────────────────────────

    fn active_texture(&mut self, unit: usize);

    /// Binds to the active texture unit; `None` unbinds.
    fn bind_texture(&mut self, texture: Option<TextureId>);

    /// `None` binds the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    fn use_program(&mut self, program: Option<ProgramId>);

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);

    /// Attribute layout for the bound vertex buffer.
    fn vertex_layout(&mut self, layout: &VertexLayout);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> Result<TextureId>;

    /// Applies sampling parameters to the bound texture.
    fn tex_parameters(&mut self, params: TextureParams);

    /// Allocates and optionally fills the bound texture.
    fn tex_image_2d(&mut self, image: TexImage<'_>) -> Result<()>;

    fn delete_texture(&mut self, texture: TextureId);

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Result<FramebufferId>;

    /// Attaches `texture` as color attachment 0 of the bound framebuffer.
    fn framebuffer_texture_2d(&mut self, texture: TextureId);

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId>;

    /// Allocates combined depth-stencil storage.
    fn renderbuffer_storage(&mut self, renderbuffer: RenderbufferId, width: u32, height: u32);

    /// Attaches `renderbuffer` as the depth-stencil attachment of the bound
    /// framebuffer.
    fn framebuffer_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    fn check_framebuffer_status(&self) -> FramebufferStatus;

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self, program: &LinkedProgram) -> Result<ProgramId>;

    fn delete_program(&mut self, program: ProgramId);

    /// Replaces the uniform block of the program in use.
    fn uniform_block(&mut self, data: &[u8]);

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self) -> Result<BufferId>;

    fn buffer_data(&mut self, target: BufferTarget, data: BufferData<'_>, usage: BufferUsage);

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    fn delete_buffer(&mut self, buffer: BufferId);

    // ── drawing ───────────────────────────────────────────────────────────

    fn draw_arrays(&mut self, topology: Topology, first: u32, count: u32);

    /// Draws `count` `u16` indices from the bound index buffer.
    fn draw_elements(&mut self, topology: Topology, count: u32, first_index: u32);

    /// Reads RGBA8 pixels of the bound framebuffer. Rows are returned
    /// top-down; `(x, y)` is the top-left corner.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>>;
}
