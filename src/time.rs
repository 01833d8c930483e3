//! Fixed-timestep accumulator.
//!
//! The presentation layer calls in with variable frame deltas; the
//! simulation only ever advances in whole fixed steps of `1000 / 60` ms.
//! Frame time is scaled by the (clamped) time scale before accumulating, so
//! slow motion and fast forward fall out of the same loop. A cap on steps
//! per frame bounds the work after a long stall; debt beyond the cap is
//! discarded rather than carried forward.

/// Length of one fixed simulation step, in milliseconds.
pub const FIXED_STEP_MS: f32 = 1000.0 / 60.0;

/// Most fixed steps one frame may drain.
pub const MAX_STEPS_PER_FRAME: u32 = 5;

pub const MIN_TIME_SCALE: f32 = 0.1;
pub const MAX_TIME_SCALE: f32 = 3.0;

/// Accumulator clock owned by the driver. [`SimClock::advance`] converts a
/// frame delta into a number of fixed steps to run; the driver calls
/// [`SimClock::complete_step`] after each one to move simulation time.
#[derive(Debug, Clone)]
pub struct SimClock {
    accumulator_ms: f32,
    time_scale: f32,
    paused: bool,
    now_ms: f64,
    tick: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            accumulator_ms: 0.0,
            time_scale: 1.0,
            paused: false,
            now_ms: 0.0,
            tick: 0,
        }
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame's wall-clock delta; returns how many fixed steps to
    /// run now. Paused or non-positive deltas accumulate nothing. When a
    /// frame would owe more than [`MAX_STEPS_PER_FRAME`] steps the excess
    /// debt is dropped.
    pub fn advance(&mut self, frame_dt_ms: f32) -> u32 {
        if self.paused || frame_dt_ms <= 0.0 {
            return 0;
        }
        self.accumulator_ms += frame_dt_ms * self.time_scale;
        let mut steps = 0;
        while self.accumulator_ms >= FIXED_STEP_MS && steps < MAX_STEPS_PER_FRAME {
            self.accumulator_ms -= FIXED_STEP_MS;
            steps += 1;
        }
        if self.accumulator_ms >= FIXED_STEP_MS {
            self.accumulator_ms = 0.0;
        }
        steps
    }

    /// Mark one fixed step as executed.
    pub fn complete_step(&mut self) {
        self.tick += 1;
        self.now_ms += FIXED_STEP_MS as f64;
    }

    /// Clamped to `[0.1, 3.0]`.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Accumulated simulation time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Completed fixed steps since construction or reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Back to t=0, unpaused, unit time scale.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
