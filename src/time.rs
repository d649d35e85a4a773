//! Frame clock for the render loop.
//!
//! Turns wall-clock frame boundaries into simulation deltas. Elapsed time is
//! the running sum of those deltas rather than `Instant::elapsed`, so pausing,
//! time scaling, stalled frames and window resizes all compose cleanly.
//!
//! # Example
//!
//! ```
//! use neural_flow::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//!
//! // Deterministic stepping (tests, offline rendering)
//! clock.advance(1.0 / 60.0);
//! clock.advance(1.0 / 60.0);
//!
//! assert_eq!(clock.frame(), 2);
//! assert!((clock.elapsed() - 2.0 / 60.0).abs() < 1e-6);
//! ```

use std::time::{Duration, Instant};

/// Largest delta a single frame may report, in seconds.
pub const MAX_DELTA: f32 = 0.25;

/// Delta-time source for the frame driver.
#[derive(Debug)]
pub struct FrameClock {
    /// When the last frame occurred.
    last_frame: Instant,
    /// Sum of all reported deltas.
    elapsed_secs: f32,
    /// Delta reported by the last frame.
    delta_secs: f32,
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Time scale multiplier (1.0 = normal speed).
    time_scale: f32,
}

impl FrameClock {
    /// Create a clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            time_scale: 1.0,
        }
    }

    /// Mark a frame boundary using the wall clock. Returns this frame's delta.
    ///
    /// While paused the delta is 0, so elapsed time and pulse decay both stop.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let delta = self.advance(raw_delta);

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        delta
    }

    /// Mark a frame boundary with an explicit raw delta in seconds.
    ///
    /// The delta is clamped to `[0, MAX_DELTA]` and scaled; non-finite input counts as 0.
    pub fn advance(&mut self, raw_delta: f32) -> f32 {
        self.frame_count += 1;

        if self.paused || !raw_delta.is_finite() {
            self.delta_secs = 0.0;
            return 0.0;
        }

        self.delta_secs = raw_delta.clamp(0.0, MAX_DELTA) * self.time_scale;
        self.elapsed_secs += self.delta_secs;
        self.delta_secs
    }

    /// Sum of all deltas so far, in seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Delta of the last frame, in seconds.
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, refreshed every half second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Whether the clock is paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current time scale multiplier.
    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            // Drop the time spent paused instead of reporting it as one long frame
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

    /// Set time scale multiplier. Negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
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
        assert_eq!(clock.elapsed(), 0.0);
        assert!(!clock.is_paused());
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn test_tick_reports_wall_time() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let delta = clock.tick();

        assert!(delta > 0.0);
        assert_eq!(clock.elapsed(), delta);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_elapsed_is_sum_of_deltas() {
        let mut clock = FrameClock::new();
        let total: f32 = [0.016, 0.02, 0.1, 0.0].iter().map(|d| clock.advance(*d)).sum();
        assert!((clock.elapsed() - total).abs() < 1e-6);
        assert!((total - 0.136).abs() < 1e-6);
    }

    #[test]
    fn test_stalled_frame_is_capped() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(3.0), MAX_DELTA);
        assert_eq!(clock.advance(-1.0), 0.0);
        assert_eq!(clock.advance(f32::NAN), 0.0);
        assert_eq!(clock.elapsed(), MAX_DELTA);
    }

    #[test]
    fn test_cap_applies_before_time_scale() {
        let mut clock = FrameClock::new();
        clock.set_time_scale(2.0);
        assert_eq!(clock.advance(3.0), MAX_DELTA * 2.0);
    }

    #[test]
    fn test_pause_stops_time() {
        let mut clock = FrameClock::new();
        clock.advance(0.1);

        clock.pause();
        assert!(clock.is_paused());
        assert_eq!(clock.advance(0.1), 0.0);
        assert!((clock.elapsed() - 0.1).abs() < 1e-6);

        clock.toggle_pause();
        assert!(!clock.is_paused());
        assert!(clock.advance(0.1) > 0.0);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FrameClock::new();
        clock.set_time_scale(2.0);
        assert!((clock.advance(0.1) - 0.2).abs() < 1e-6);

        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
    }
}
