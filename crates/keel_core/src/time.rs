//! Wall-clock bookkeeping for the fixed-rate frame loop.
//!
//! The clock throttles the loop to [`TICK_INTERVAL`], reports the per-tick
//! delta as the time *actually* elapsed (so it stretches under load rather
//! than lying about the nominal rate), and publishes a frames-per-second
//! sample once per second. The sample boundary advances in exact one-second
//! steps instead of snapping to "now", which keeps sampling phase-aligned
//! when the crossing tick lands late.

use std::time::{Duration, Instant};

/// One tick every 1000/60 ms, truncated to whole milliseconds.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

const FPS_WINDOW: Duration = Duration::from_millis(1000);

pub struct FrameClock {
    tick_interval: Duration,
    last_tick: Instant,
    last_second_mark: Instant,
    frames_this_second: u32,
    current_fps: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Clock with an explicit epoch. Tests drive it with synthetic instants.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            last_tick: now,
            last_second_mark: now,
            frames_this_second: 0,
            current_fps: 0,
        }
    }

    /// Spins until at least one tick interval has elapsed since the previous
    /// tick, then advances the clock. Returns the delta in seconds.
    pub fn wait_for_tick(&mut self) -> f32 {
        let mut now = Instant::now();
        while now.duration_since(self.last_tick) < self.tick_interval {
            std::hint::spin_loop();
            now = Instant::now();
        }
        self.tick_at(now)
    }

    /// Advances the clock to `now` and returns the elapsed delta in seconds.
    /// Never waits; `wait_for_tick` handles throttling.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        if now.duration_since(self.last_second_mark) >= FPS_WINDOW {
            self.current_fps = self.frames_this_second;
            self.frames_this_second = 0;
            self.last_second_mark += FPS_WINDOW;
        }
        self.frames_this_second += 1;

        delta
    }

    /// Most recent once-per-second sample; zero until the first second
    /// completes. A trailing value, never interpolated.
    pub fn fps(&self) -> u32 {
        self.current_fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
