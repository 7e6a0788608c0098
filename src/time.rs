//! Frame timing.
//!
//! Particle systems advance by a frame *ratio*: the frame's duration relative
//! to a 60 fps frame. [`FrameClock`] measures real time with `std::time` and
//! turns each frame into a [`FrameTick`] carrying that ratio and a fresh
//! frame id.
//!
//! # Example
//!
//! ```ignore
//! use emberfall::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//!
//! // In your game loop:
//! let tick = clock.tick();
//! system.step(&tick.context(&NoTransforms));
//!
//! println!("ratio {:.2}, {:.1} fps", tick.ratio, clock.fps());
//! ```

use crate::emitter::TransformResolver;
use crate::system::FrameContext;
use std::time::{Duration, Instant};

/// Duration of the reference frame the ratio is relative to.
pub const REFERENCE_FRAME_SECS: f32 = 1.0 / 60.0;

/// One host frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Frame duration in seconds, after pause and time scale.
    pub delta: f32,
    /// `delta` relative to a 60 fps frame.
    pub ratio: f32,
    /// Increases by one every tick, paused or not.
    pub frame_id: u64,
}

impl FrameTick {
    /// Tick for a given delta, outside of any clock.
    pub fn from_delta(delta: f32, frame_id: u64) -> Self {
        Self {
            delta,
            ratio: delta / REFERENCE_FRAME_SECS,
            frame_id,
        }
    }

    /// Step input for particle systems.
    pub fn context<'a>(&self, transforms: &'a dyn TransformResolver) -> FrameContext<'a> {
        FrameContext {
            ratio: self.ratio,
            frame_id: self.frame_id,
            transforms,
        }
    }
}

/// Frame clock with pause, fixed delta and time scale.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    delta_secs: f32,
    elapsed_secs: f32,
    frame_id: u64,
    fps: f32,
    fps_frame_id: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Fixed delta for deterministic stepping.
    fixed_delta: Option<f32>,
    time_scale: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            delta_secs: 0.0,
            elapsed_secs: 0.0,
            frame_id: 0,
            fps: 0.0,
            fps_frame_id: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            time_scale: 1.0,
        }
    }

    /// Close the current frame. Call once per host frame.
    pub fn tick(&mut self) -> FrameTick {
        let now = Instant::now();
        self.frame_id += 1;

        if self.paused {
            self.delta_secs = 0.0;
            self.last_frame = now;
        } else {
            let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
            self.delta_secs = self.fixed_delta.unwrap_or(raw_delta) * self.time_scale;
            self.elapsed_secs += self.delta_secs;
            self.last_frame = now;
        }

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_id - self.fps_frame_id;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_id = self.frame_id;
            self.fps_update_time = now;
        }

        FrameTick::from_delta(self.delta_secs, self.frame_id)
    }

    /// Scaled time since creation, excluding pauses.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Id of the last tick; 0 before the first one.
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

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

    /// While paused, ticks carry a zero ratio.
    pub fn pause(&mut self) {
        self.paused = true;
    }

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

    /// Use a fixed delta instead of measured time. `None` measures again.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    /// Slow motion below 1, fast forward above. Negative scales clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
