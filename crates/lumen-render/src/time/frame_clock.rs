use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped time since the previous tick, in seconds.
    pub dt: f32,

    pub now: Instant,

    pub frame_index: u64,

    /// Fixed simulation steps that became due during this tick.
    pub steps: u32,

    /// Fraction of a fixed step left in the accumulator, in `[0, 1)`.
    pub interpolation: f32,
}

/// Frame clock with a fixed-step accumulator.
///
/// Delta time is clamped so a debugger pause or a minimized window does not
/// produce a burst of simulation steps.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
    step: Duration,
    accumulator: Duration,
}

impl FrameClock {
    /// 60 Hz fixed step, dt clamped to `[0.1 ms, 250 ms]`.
    pub fn new() -> Self {
        Self::with_step(Duration::from_micros(16_667))
    }

    pub fn with_step(step: Duration) -> Self {
        debug_assert!(!step.is_zero());
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
            step,
            accumulator: Duration::ZERO,
        }
    }

    /// Resets the baseline, e.g. after the context was restored.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.accumulator = Duration::ZERO;
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
            steps,
            interpolation: self.accumulator.as_secs_f32() / self.step.as_secs_f32(),
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fixed_steps_and_remainder() {
        let mut clock = FrameClock::with_step(Duration::from_millis(10));
        let start = clock.last;

        let ft = clock.tick_at(start + Duration::from_millis(25));
        assert_eq!(ft.steps, 2);
        assert!((ft.interpolation - 0.5).abs() < 1e-4);
        assert_eq!(ft.frame_index, 0);

        let ft = clock.tick_at(start + Duration::from_millis(30));
        assert_eq!(ft.steps, 1);
        assert!(ft.interpolation.abs() < 1e-4);
        assert_eq!(ft.frame_index, 1);
    }

    #[test]
    fn long_stall_is_clamped() {
        let mut clock = FrameClock::with_step(Duration::from_millis(10));
        let start = clock.last;
        let ft = clock.tick_at(start + Duration::from_secs(5));
        assert!((ft.dt - 0.25).abs() < 1e-6);
        assert_eq!(ft.steps, 25);
    }
}
