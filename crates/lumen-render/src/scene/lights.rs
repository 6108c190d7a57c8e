use glam::Vec2;

use super::Camera;
use crate::color::Color;

/// A point light in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    pub position: Vec2,
    /// World units; nothing is lit past it.
    pub radius: f32,
    pub color: Color,
    pub intensity: f32,
    pub visible: bool,
}

impl Light {
    pub fn new(position: Vec2, radius: f32, color: Color, intensity: f32) -> Self {
        Self { position, radius, color, intensity, visible: true }
    }
}

/// The scene's lights and ambient color, read by the light pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LightManager {
    lights: Vec<Light>,
    pub ambient_color: Color,
    active: bool,
}

impl Default for LightManager {
    fn default() -> Self {
        Self { lights: Vec::new(), ambient_color: Color::rgba(0.1, 0.1, 0.1, 1.0), active: false }
    }
}

impl LightManager {
    pub fn enable(&mut self) {
        self.active = true;
    }

    pub fn disable(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Adds `light` and returns its index.
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn remove_light(&mut self, index: usize) -> Option<Light> {
        (index < self.lights.len()).then(|| self.lights.remove(index))
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    /// Visible lights reaching `camera`'s view, nearest first, at most
    /// `max`.
    pub fn cull(&self, camera: &Camera, max: usize) -> Vec<&Light> {
        let center = camera.world_center();
        let view_radius = camera.world_radius();

        let mut culled: Vec<(f32, &Light)> = self
            .lights
            .iter()
            .filter(|light| light.visible && light.radius > 0.0)
            .map(|light| (light.position.distance(center), light))
            .filter(|(distance, light)| *distance < view_radius + light.radius)
            .collect();
        culled.sort_by(|a, b| a.0.total_cmp(&b.0));
        culled.into_iter().take(max).map(|(_, light)| light).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cull_drops_far_and_hidden_lights_and_sorts_by_distance() {
        let mut lights = LightManager::default();
        let cam = Camera::new(0.0, 0.0, 100.0, 100.0);
        lights.add_light(Light::new(Vec2::new(90.0, 50.0), 10.0, Color::WHITE, 1.0));
        lights.add_light(Light::new(Vec2::new(50.0, 50.0), 10.0, Color::WHITE, 1.0));
        lights.add_light(Light::new(Vec2::new(1000.0, 50.0), 10.0, Color::WHITE, 1.0));
        let hidden = lights.add_light(Light::new(Vec2::new(40.0, 50.0), 10.0, Color::WHITE, 1.0));
        lights.lights_mut()[hidden].visible = false;

        let culled = lights.cull(&cam, 10);
        let xs: Vec<f32> = culled.iter().map(|l| l.position.x).collect();
        assert_eq!(xs, vec![50.0, 90.0]);
        assert_eq!(lights.cull(&cam, 1).len(), 1);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut lights = LightManager::default();
        assert!(lights.remove_light(0).is_none());
        lights.add_light(Light::new(Vec2::ZERO, 1.0, Color::WHITE, 1.0));
        assert!(lights.remove_light(0).is_some());
        assert!(lights.lights().is_empty());
    }
}
