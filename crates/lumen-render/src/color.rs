/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// This is the color model of the renderer's public surface (background,
/// tints, camera effects, lights). Premultiplication happens at the last
/// moment: in the vertex shader for tints and in the blend state for
/// output.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    #[inline]
    pub const fn transparent() -> Self {
        Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    #[inline]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from straight sRGB bytes (`0`–`255`).
    #[inline]
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Creates an opaque color from a `0xRRGGBB` literal.
    #[inline]
    pub fn from_hex(rgb: u32) -> Self {
        Self::from_rgba_u8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }

    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Returns `true` when drawing this color would change nothing.
    #[inline]
    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Byte representation, channels clamped and rounded.
    #[inline]
    pub fn to_rgba_u8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Packs the color for an `Unorm8x4` vertex attribute.
    ///
    /// Memory order is `r, g, b, a`, so the shader receives `vec4(r, g, b, a)`.
    #[inline]
    pub fn packed(self) -> u32 {
        u32::from_le_bytes(self.to_rgba_u8())
    }

    /// Premultiplied copy, as expected by a premultiplied render target.
    #[inline]
    pub fn premultiplied(self) -> Self {
        let a = self.a.clamp(0.0, 1.0);
        Self::rgba(self.r * a, self.g * a, self.b * a, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decodes_channels() {
        let c = Color::from_hex(0xff8000);
        assert_eq!(c.to_rgba_u8(), [255, 128, 0, 255]);
    }

    #[test]
    fn packed_is_rgba_in_memory_order() {
        let c = Color::from_rgba_u8(1, 2, 3, 4);
        assert_eq!(c.packed().to_le_bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn premultiplied_scales_rgb_by_alpha() {
        let c = Color::rgba(1.0, 0.5, 0.0, 0.5).premultiplied();
        assert_eq!(c, Color::rgba(0.5, 0.25, 0.0, 0.5));
    }

    #[test]
    fn transparent_detection() {
        assert!(Color::transparent().is_transparent());
        assert!(!Color::BLACK.is_transparent());
    }
}
