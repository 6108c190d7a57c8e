use glam::{Affine2, Vec2};

use crate::color::Color;
use crate::geom::Rect;

/// A full-viewport color overlay (flash, fade) drawn after the camera's
/// children.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraEffect {
    pub active: bool,
    pub color: Color,
    /// Overlay opacity, `0`–`1`, multiplied with `color.a`.
    pub alpha: f32,
}

impl Default for CameraEffect {
    fn default() -> Self {
        Self { active: false, color: Color::WHITE, alpha: 0.0 }
    }
}

impl CameraEffect {
    pub fn new(color: Color, alpha: f32) -> Self {
        Self { active: true, color, alpha }
    }

    pub fn is_visible(&self) -> bool {
        self.active && self.alpha > 0.0 && !self.color.is_transparent()
    }

    pub fn overlay_color(&self) -> Color {
        self.color.with_alpha(self.color.a * self.alpha.clamp(0.0, 1.0))
    }
}

/// A view into the world, drawn into a viewport of the drawing buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Viewport in logical pixels.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    /// World position shown at the viewport's top-left at zoom 1.
    pub scroll: Vec2,
    pub zoom: f32,
    /// Radians, about the viewport center.
    pub rotation: f32,
    pub round_pixels: bool,

    /// Filled before any child renders; transparent skips the fill.
    pub background_color: Color,
    pub flash: CameraEffect,
    pub fade: CameraEffect,
}

impl Camera {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scroll: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            round_pixels: false,
            background_color: Color::transparent(),
            flash: CameraEffect::default(),
            fade: CameraEffect::default(),
        }
    }

    pub fn viewport(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn half_size(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * 0.5
    }

    /// World → screen (logical pixels) transform.
    pub fn matrix(&self) -> Affine2 {
        let half = self.half_size();
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Affine2::from_translation(Vec2::new(self.x, self.y) + half)
            * Affine2::from_angle(self.rotation)
            * Affine2::from_scale(Vec2::splat(zoom))
            * Affine2::from_translation(-(self.scroll + half))
    }

    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        let p = self.matrix().transform_point2(point);
        if self.round_pixels { p.round() } else { p }
    }

    /// World point under the viewport center.
    pub fn world_center(&self) -> Vec2 {
        self.scroll + self.half_size()
    }

    /// Radius in world units of the circle enclosing the visible area.
    pub fn world_radius(&self) -> f32 {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        self.half_size().length() / zoom
    }

    pub fn flash(&mut self, color: Color, alpha: f32) {
        self.flash = CameraEffect::new(color, alpha);
    }

    pub fn fade(&mut self, color: Color, alpha: f32) {
        self.fade = CameraEffect::new(color, alpha);
    }

    pub fn reset_effects(&mut self) {
        self.flash = CameraEffect::default();
        self.fade = CameraEffect::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn identity_camera_offsets_by_viewport_origin() {
        let cam = Camera::new(10.0, 20.0, 100.0, 50.0);
        assert!(approx(cam.world_to_screen(Vec2::new(5.0, 5.0)), Vec2::new(15.0, 25.0)));
    }

    #[test]
    fn zoom_scales_about_the_viewport_center() {
        let mut cam = Camera::new(0.0, 0.0, 100.0, 100.0);
        cam.zoom = 2.0;
        assert!(approx(cam.world_to_screen(Vec2::new(50.0, 50.0)), Vec2::new(50.0, 50.0)));
        assert!(approx(cam.world_to_screen(Vec2::new(60.0, 50.0)), Vec2::new(70.0, 50.0)));
        assert!((cam.world_radius() - 50.0_f32.hypot(50.0) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn scroll_moves_the_world() {
        let mut cam = Camera::new(0.0, 0.0, 100.0, 100.0);
        cam.scroll = Vec2::new(30.0, 0.0);
        assert!(approx(cam.world_to_screen(Vec2::new(30.0, 0.0)), Vec2::ZERO));
        assert!(approx(cam.world_center(), Vec2::new(80.0, 50.0)));
    }

    #[test]
    fn effects_are_visible_only_when_active_and_opaque_enough() {
        assert!(!CameraEffect::default().is_visible());
        assert!(!CameraEffect::new(Color::WHITE, 0.0).is_visible());
        let fade = CameraEffect::new(Color::BLACK, 0.5);
        assert!(fade.is_visible());
        assert_eq!(fade.overlay_color().a, 0.5);
    }
}
