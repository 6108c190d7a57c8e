//! Lumen render crate.
//!
//! A batched GPU renderer for 2D scenes: resource factory, cached render
//! state, scissor stack, pipeline registry, per-frame orchestration and an
//! explicit context lifecycle, over a WebGL-shaped context trait.

pub mod context;
pub mod renderer;
pub mod pipeline;
pub mod resources;
pub mod mask;
pub mod blend;

pub mod config;
pub mod error;
pub mod logging;
pub mod geom;
pub mod color;
pub mod scene;
pub mod time;
pub mod host;

pub use color::Color;
pub use config::RendererConfig;
pub use error::{RenderError, Result};
pub use renderer::Renderer;

pub use glam;
pub use winit;
