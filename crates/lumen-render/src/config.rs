use crate::color::Color;

/// GPU adapter preference forwarded to the context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    HighPerformance,
    LowPower,
}

/// Attributes requested when the drawing context is created.
#[derive(Debug, Clone)]
pub struct ContextAttributes {
    /// Canvas is composited with whatever is behind it.
    pub transparent: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    /// Always requested; masks and depth-stencil framebuffers rely on it.
    pub stencil: bool,
    pub preserve_drawing_buffer: bool,
    pub power_preference: PowerPreference,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            transparent: false,
            antialias: true,
            premultiplied_alpha: true,
            stencil: true,
            preserve_drawing_buffer: false,
            power_preference: PowerPreference::Default,
        }
    }
}

/// Renderer configuration.
///
/// `width`/`height` are logical pixels; the drawing buffer is
/// `floor(size × resolution)` device pixels.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    pub background_color: Color,
    pub clear_before_render: bool,
    /// Forces nearest filtering for every texture created from a source.
    pub pixel_art: bool,
    pub antialias: bool,
    /// Quads per pipeline batch before an implicit flush.
    pub batch_size: usize,
    /// Upper bound on texture units used; clamped to what the context offers.
    pub max_textures: usize,
    pub context: ContextAttributes,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            resolution: 1.0,
            background_color: Color::BLACK,
            clear_before_render: true,
            pixel_art: false,
            antialias: true,
            batch_size: 2000,
            max_textures: 16,
            context: ContextAttributes::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Drawing buffer size in device pixels.
    pub fn device_size(&self) -> (u32, u32) {
        device_size(self.width, self.height, self.resolution)
    }
}

pub(crate) fn device_size(width: u32, height: u32, resolution: f32) -> (u32, u32) {
    let res = if resolution > 0.0 { resolution } else { 1.0 };
    (
        (width as f32 * res).floor() as u32,
        (height as f32 * res).floor() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_size_floors_fractional_resolution() {
        let config = RendererConfig::default().with_size(101, 51).with_resolution(1.5);
        assert_eq!(config.device_size(), (151, 76));
    }

    #[test]
    fn non_positive_resolution_falls_back_to_one() {
        assert_eq!(device_size(10, 20, 0.0), (10, 20));
    }

    #[test]
    fn stencil_is_requested_by_default() {
        assert!(ContextAttributes::default().stencil);
    }
}
