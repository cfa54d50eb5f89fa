//! Single-axis step/direction pulse generator
//!
//! Generates constant-speed step pulses on a STEP/DIR driver (A4988,
//! TMC2209 in standalone mode, and similar) from plain GPIO outputs.
//!
//! # Timing
//!
//! The generator is driven by calling [`PulseStepper::poll`] at a fixed
//! period. Each poll does at most one of:
//!
//! - drop a STEP pin raised by the previous poll
//! - set up the DIR pin when the direction changes
//! - raise STEP if a step is due
//!
//! so the STEP pulse width and the DIR setup time are each at least one
//! poll period. The highest reachable rate is one step every two polls.
//!
//! Position is counted on every rising STEP edge, so it is exact as long as
//! the driver does not miss steps.

use embedded_hal::digital::OutputPin;

/// What the stepper is doing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseMode {
    /// Not stepping
    Idle,
    /// Stepping toward an absolute position
    MoveTo(i32),
    /// Stepping with no endpoint
    Run,
}

/// Step/direction pulse generator
pub struct PulseStepper<STEP, DIR> {
    step: STEP,
    dir: DIR,
    /// DIR pin high means negative travel
    invert_dir: bool,
    position: i32,
    mode: PulseMode,
    /// +1 or -1
    direction: i32,
    /// Direction currently applied to the DIR pin, if known
    applied_direction: Option<i32>,
    interval_us: u32,
    since_step_us: u32,
    step_high: bool,
    faulted: bool,
}

impl<STEP: OutputPin, DIR: OutputPin> PulseStepper<STEP, DIR> {
    /// Create a new pulse stepper at position 0
    ///
    /// # Arguments
    /// - `step`: STEP output, idle low
    /// - `dir`: DIR output
    /// - `invert_dir`: If true, DIR high drives toward negative positions
    pub fn new(step: STEP, dir: DIR, invert_dir: bool) -> Self {
        Self {
            step,
            dir,
            invert_dir,
            position: 0,
            mode: PulseMode::Idle,
            direction: 1,
            applied_direction: None,
            interval_us: 0,
            since_step_us: 0,
            step_high: false,
            faulted: false,
        }
    }

    /// Current mode
    pub fn mode(&self) -> PulseMode {
        self.mode
    }

    /// Current position in steps
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Redefine the current position without moving
    pub fn set_position(&mut self, steps: i32) {
        if let PulseMode::MoveTo(target) = self.mode {
            // Keep the remaining travel
            self.mode = PulseMode::MoveTo(target.saturating_add(steps - self.position));
        }
        self.position = steps;
    }

    /// Check if the stepper is generating pulses
    pub fn is_moving(&self) -> bool {
        self.mode != PulseMode::Idle
    }

    /// Check if a pin write has failed
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Step to an absolute position at `steps_per_sec`
    ///
    /// A zero or negative speed, or a target equal to the current
    /// position, leaves the stepper idle.
    pub fn move_to(&mut self, target: i32, steps_per_sec: f32) {
        if target == self.position || !(steps_per_sec > 0.0) {
            self.stop();
            return;
        }
        self.direction = if target > self.position { 1 } else { -1 };
        self.start(PulseMode::MoveTo(target), steps_per_sec);
    }

    /// Step continuously at a signed speed
    pub fn run_at(&mut self, steps_per_sec: f32) {
        if steps_per_sec == 0.0 || !steps_per_sec.is_finite() {
            self.stop();
            return;
        }
        self.direction = if steps_per_sec > 0.0 { 1 } else { -1 };
        self.start(PulseMode::Run, steps_per_sec.abs());
    }

    /// Stop immediately
    ///
    /// A STEP pulse in flight is completed by the next poll and already
    /// counted.
    pub fn stop(&mut self) {
        self.mode = PulseMode::Idle;
    }

    /// Advance by `elapsed_us` and emit at most one pin change
    ///
    /// Returns true if a step was taken.
    pub fn poll(&mut self, elapsed_us: u32) -> bool {
        if self.mode != PulseMode::Idle {
            self.since_step_us = self.since_step_us.saturating_add(elapsed_us);
        }

        if self.step_high {
            self.step_high = false;
            let _ = self.write_step(false);
            return false;
        }

        if self.mode == PulseMode::Idle {
            return false;
        }

        if self.applied_direction != Some(self.direction) {
            let negative = self.direction < 0;
            self.write_dir(negative != self.invert_dir);
            self.applied_direction = Some(self.direction);
            return false;
        }

        if self.since_step_us < self.interval_us {
            return false;
        }
        // No catch-up bursts after a late poll
        self.since_step_us = (self.since_step_us - self.interval_us).min(self.interval_us);

        if !self.write_step(true) {
            return false;
        }
        self.step_high = true;
        self.position = self.position.wrapping_add(self.direction);

        if self.mode == PulseMode::MoveTo(self.position) {
            self.mode = PulseMode::Idle;
        }
        true
    }

    fn start(&mut self, mode: PulseMode, steps_per_sec: f32) {
        self.interval_us = (1_000_000.0 / steps_per_sec) as u32;
        if self.mode == PulseMode::Idle {
            self.since_step_us = 0;
        }
        self.mode = mode;
    }

    fn write_step(&mut self, high: bool) -> bool {
        let result = if high {
            self.step.set_high()
        } else {
            self.step.set_low()
        };
        if result.is_err() {
            self.faulted = true;
            self.mode = PulseMode::Idle;
        }
        result.is_ok()
    }

    fn write_dir(&mut self, high: bool) {
        let result = if high {
            self.dir.set_high()
        } else {
            self.dir.set_low()
        };
        if result.is_err() {
            self.faulted = true;
            self.mode = PulseMode::Idle;
        }
    }
}
