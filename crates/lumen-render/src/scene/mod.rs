//! The slice of the scene the renderer reads: cameras and lights.
//!
//! Display lists, game objects and scene lifecycle live with the host; the
//! orchestrator only needs a camera per pass and the scene's lights.

mod camera;
mod lights;

pub use camera::{Camera, CameraEffect};
pub use lights::{Light, LightManager};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub lights: LightManager,
}
