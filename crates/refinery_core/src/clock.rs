//! Tick scheduler: wall-clock seconds in, whole simulated-minute ticks out.

use serde::{Deserialize, Serialize};

use crate::Constants;

pub const SPEED_PRESETS: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];
pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    /// Simulated minutes elapsed since reset. One tick = one minute.
    pub minute: u64,
    pub running: bool,
    pub speed: f64,
    /// Fractional minutes carried between `update` calls.
    pub accumulator: f64,
    pub step_requested: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            minute: 0,
            running: true,
            speed: 1.0,
            accumulator: 0.0,
            step_requested: false,
        }
    }
}

impl Clock {
    /// Decide how many ticks this frame drains.
    ///
    /// A pending single-step wins: exactly one tick, then the clock pauses.
    /// Excess beyond `max_ticks_per_update` is dropped rather than carried.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn plan(&mut self, delta_seconds: f64, constants: &Constants) -> u32 {
        if self.step_requested {
            self.step_requested = false;
            self.running = false;
            self.accumulator = 0.0;
            return 1;
        }
        if !self.running || !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return 0;
        }
        self.accumulator += delta_seconds * self.speed * constants.base_minutes_per_second;
        let whole = self.accumulator.floor();
        self.accumulator -= whole;
        whole.min(f64::from(constants.max_ticks_per_update)) as u32
    }

    pub fn hours(&self) -> f64 {
        self.minute as f64 / 60.0
    }

    pub fn day(&self) -> u64 {
        self.minute / 1440
    }

    pub fn hour_of_day(&self) -> u64 {
        (self.minute % 1440) / 60
    }

    pub fn toggle_running(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    pub fn request_step(&mut self) {
        self.step_requested = true;
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() {
            self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        }
    }

    pub fn set_speed_preset(&mut self, index: usize) {
        let index = index.min(SPEED_PRESETS.len() - 1);
        self.speed = SPEED_PRESETS[index];
    }

    /// Step up to the next preset above the current speed.
    pub fn faster(&mut self) {
        if let Some(next) = SPEED_PRESETS.iter().find(|&&s| s > self.speed + 1e-9) {
            self.speed = *next;
        }
    }

    /// Step down to the next preset below the current speed.
    pub fn slower(&mut self) {
        if let Some(prev) = SPEED_PRESETS.iter().rev().find(|&&s| s < self.speed - 1e-9) {
            self.speed = *prev;
        }
    }
}
