//! Windowed host: a winit event loop owning one window, its wgpu context
//! and the renderer.
//!
//! `suspended` / `resumed` are forwarded as context loss / restoration.

mod runtime;

pub use runtime::{Game, Host, HostConfig, HostControl};
