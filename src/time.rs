//! Frame timing.
//!
//! [`Engine::tick`](crate::Engine::tick) takes a unitless frame multiplier
//! rather than seconds: `1.0` is one frame at the nominal 60 frames per
//! second. [`FrameClock`] turns wall-clock time into that multiplier.
//!
//! # Example
//!
//! ```ignore
//! use flurry::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//!
//! // In your render loop:
//! let delta = clock.update();
//! engine.tick(delta)?;
//!
//! println!("Frame: {}", clock.frame());
//! println!("FPS: {:.1}", clock.fps());
//! ```

use std::time::{Duration, Instant};

/// Frames per second at which one tick equals a delta of `1.0`.
pub const NOMINAL_FPS: f32 = 60.0;

/// Default upper bound on a single delta, in nominal frames.
pub const DEFAULT_MAX_DELTA: f32 = 4.0;

/// Converts elapsed wall-clock time into frame multipliers.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    /// Latest delta in nominal frames.
    delta: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Fixed delta in nominal frames, if set.
    fixed_delta: Option<f32>,
    time_scale: f32,
    max_delta: f32,
}

impl FrameClock {
    /// Create a clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            delta: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
            max_delta: DEFAULT_MAX_DELTA,
        }
    }

    /// Advance the clock. Call once per rendered frame.
    ///
    /// Returns the delta to pass to `tick`, already scaled and capped.
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;

        if self.paused {
            self.delta = 0.0;
            return self.delta;
        }

        self.delta = self.scaled(elapsed);
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta
    }

    fn scaled(&self, elapsed: Duration) -> f32 {
        let frames = self
            .fixed_delta
            .unwrap_or_else(|| elapsed.as_secs_f32() * NOMINAL_FPS);
        (frames * self.time_scale).min(self.max_delta)
    }

    /// Delta returned by the last `update`.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Frames counted since creation or the last reset. Paused updates do not
    /// count.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Measured frames per second, refreshed twice a second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    #[inline]
    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    /// Stop the clock. Updates return `0.0` until resumed.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume after a pause. Time spent paused is not counted.
    pub fn resume(&mut self) {
        if self.paused {
            self.last_frame = Instant::now();
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Use a constant delta, in nominal frames, instead of measuring.
    /// `None` goes back to wall-clock timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Speed multiplier. Negative values clamp to zero.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Largest delta a single update may return.
    pub fn set_max_delta(&mut self, max: f32) {
        self.max_delta = max.max(0.0);
    }

    /// Restart counting from now. Scale, cap and fixed delta are kept.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_frame = now;
        self.delta = 0.0;
        self.frame_count = 0;
        self.fps = 0.0;
        self.fps_frame_count = 0;
        self.fps_update_time = now;
        self.paused = false;
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
    use std::thread;

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new();
        assert_eq!(clock.frame(), 0);
        assert_eq!(clock.delta(), 0.0);
        assert!(!clock.is_paused());
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn test_update_measures_frames() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let delta = clock.update();

        // 10ms is at least 0.6 of a 60fps frame.
        assert!(delta >= 0.6);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_pause_yields_zero() {
        let mut clock = FrameClock::new();
        clock.update();

        clock.pause();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.update(), 0.0);
        assert_eq!(clock.frame(), 1);

        clock.resume();
        clock.set_fixed_delta(Some(1.0));
        assert_eq!(clock.update(), 1.0);
    }

    #[test]
    fn test_time_scale_clamps_negative() {
        let mut clock = FrameClock::new();
        clock.set_time_scale(2.0);
        assert_eq!(clock.time_scale(), 2.0);

        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }

    #[test]
    fn test_fixed_delta_ignores_wall_clock() {
        let mut clock = FrameClock::new();
        clock.set_fixed_delta(Some(1.0));
        clock.set_time_scale(0.5);

        thread::sleep(Duration::from_millis(50));
        assert!((clock.update() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stall_is_capped() {
        let mut clock = FrameClock::new();
        clock.set_max_delta(2.0);

        // 100ms is six nominal frames.
        thread::sleep(Duration::from_millis(100));
        assert_eq!(clock.update(), 2.0);
    }
}
