use std::fmt;

// ── object ids ────────────────────────────────────────────────────────────

macro_rules! gl_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

gl_id!(
    /// Context-local texture name.
    TextureId
);
gl_id!(
    /// Context-local buffer name.
    BufferId
);
gl_id!(
    /// Context-local framebuffer name. `None` in the API means the default
    /// (presented) framebuffer.
    FramebufferId
);
gl_id!(
    /// Context-local renderbuffer name.
    RenderbufferId
);
gl_id!(
    /// Context-local program name.
    ProgramId
);

// ── fixed-function state ──────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    ScissorTest,
    DepthTest,
    CullFace,
}

/// Buffers cleared by [`super::GlContext::clear`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl ClearFlags {
    pub const COLOR: ClearFlags = ClearFlags { color: true, depth: false, stencil: false };
    pub const ALL: ClearFlags = ClearFlags { color: true, depth: true, stencil: true };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

/// Fully resolved blend state as the context applies it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color_equation: BlendEquation,
    pub alpha_equation: BlendEquation,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            color_equation: BlendEquation::Add,
            alpha_equation: BlendEquation::Add,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

// ── textures ──────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Linear,
    Nearest,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureParams {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
        }
    }
}

/// One `tex_image_2d` upload into the bound texture.
#[derive(Debug, Copy, Clone)]
pub struct TexImage<'a> {
    pub mip_level: u32,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// `None` allocates storage without initializing it.
    pub pixels: Option<&'a [u8]>,
    /// Multiply color channels by alpha while uploading.
    pub premultiply_alpha: bool,
    /// Store rows bottom-up.
    pub flip_y: bool,
}

// ── buffers & geometry ────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
    Stream,
}

#[derive(Debug, Copy, Clone)]
pub enum BufferData<'a> {
    Bytes(&'a [u8]),
    /// Zero-initialized storage of the given size.
    Size(usize),
}

impl BufferData<'_> {
    pub fn len(&self) -> usize {
        match self {
            BufferData::Bytes(b) => b.len(),
            BufferData::Size(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    TriangleStrip,
    Lines,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    /// Four normalized bytes, typically a packed color.
    Unorm8x4,
}

impl VertexFormat {
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
            VertexFormat::Unorm8x4 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Interleaved layout of the bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Builds a tightly packed layout; locations follow declaration order.
    pub fn packed(formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, &format)| {
                let attr = VertexAttribute { location: location as u32, format, offset };
                offset += format.size();
                attr
            })
            .collect();
        Self { stride: offset, attributes }
    }
}

// ── framebuffers ──────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDimensions,
    Unsupported,
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FramebufferStatus::Complete => "Complete",
            FramebufferStatus::IncompleteAttachment => "Incomplete Attachment",
            FramebufferStatus::MissingAttachment => "Missing Attachment",
            FramebufferStatus::IncompleteDimensions => "Incomplete Dimensions",
            FramebufferStatus::Unsupported => "Framebuffer Unsupported",
        })
    }
}

/// What a context knows about an attachment when checking completeness.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub width: u32,
    pub height: u32,
    /// `false` for a texture that never received `tex_image_2d`.
    pub allocated: bool,
    pub renderable: bool,
}

/// Completeness rule shared by every context implementation.
pub fn framebuffer_completeness(
    color: Option<AttachmentInfo>,
    depth_stencil: Option<AttachmentInfo>,
) -> FramebufferStatus {
    let Some(color) = color else {
        return FramebufferStatus::MissingAttachment;
    };

    for attachment in std::iter::once(color).chain(depth_stencil) {
        if !attachment.allocated || attachment.width == 0 || attachment.height == 0 {
            return FramebufferStatus::IncompleteAttachment;
        }
        if !attachment.renderable {
            return FramebufferStatus::Unsupported;
        }
    }

    let mismatched = depth_stencil
        .is_some_and(|ds| ds.width != color.width || ds.height != color.height);
    if mismatched {
        return FramebufferStatus::IncompleteDimensions;
    }

    FramebufferStatus::Complete
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(width: u32, height: u32) -> AttachmentInfo {
        AttachmentInfo { width, height, allocated: true, renderable: true }
    }

    #[test]
    fn packed_layout_offsets_accumulate() {
        let layout = VertexLayout::packed(&[
            VertexFormat::Float32x2,
            VertexFormat::Float32x2,
            VertexFormat::Float32,
            VertexFormat::Unorm8x4,
        ]);
        assert_eq!(layout.stride, 24);
        let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 20]);
        assert_eq!(layout.attributes[3].location, 3);
    }

    #[test]
    fn completeness_rules() {
        assert_eq!(framebuffer_completeness(None, None), FramebufferStatus::MissingAttachment);
        assert_eq!(framebuffer_completeness(Some(att(4, 4)), None), FramebufferStatus::Complete);
        assert_eq!(
            framebuffer_completeness(Some(att(4, 4)), Some(att(8, 8))),
            FramebufferStatus::IncompleteDimensions
        );

        let unallocated = AttachmentInfo { allocated: false, ..att(4, 4) };
        assert_eq!(
            framebuffer_completeness(Some(unallocated), None),
            FramebufferStatus::IncompleteAttachment
        );

        let unsupported = AttachmentInfo { renderable: false, ..att(4, 4) };
        assert_eq!(
            framebuffer_completeness(Some(unsupported), None),
            FramebufferStatus::Unsupported
        );
    }
}
