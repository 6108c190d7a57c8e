//! Frame timing.
//!
//! One [`FrameClock`] per render loop. `tick()` once per presented frame; the
//! returned [`FrameTime::interpolation`] is what the renderer forwards to every
//! renderable for smoothing between fixed simulation steps.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
