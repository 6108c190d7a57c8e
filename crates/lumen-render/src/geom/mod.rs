//! Geometry primitives shared by the renderer.
//!
//! Logical rectangles use `f32` and a top-left origin. Device rectangles are
//! integer pixels of the drawing buffer, also top-left origin; the flip to the
//! GPU's bottom-left scissor origin happens in exactly one place (the scissor
//! stack).

mod rect;

pub use glam::{Affine2, Mat4, Vec2};
pub use rect::{DeviceRect, Rect};
