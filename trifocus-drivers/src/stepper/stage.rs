//! Three-actuator step generator
//!
//! Bundles one [`PulseStepper`] per actuator behind the
//! [`StepGenerator`] trait the control tick drives.

use embedded_hal::digital::OutputPin;
use trifocus_core::kinematics::{Actuator, AxisSpeeds, StepCounts};
use trifocus_core::traits::StepGenerator;

use super::pulse::PulseStepper;

/// Step generator for the three mirror actuators
pub struct StageSteppers<STEP, DIR> {
    axes: [PulseStepper<STEP, DIR>; 3],
}

impl<STEP: OutputPin, DIR: OutputPin> StageSteppers<STEP, DIR> {
    /// Create from the A, B and C pulse steppers
    pub fn new(axes: [PulseStepper<STEP, DIR>; 3]) -> Self {
        Self { axes }
    }

    /// One actuator's pulse stepper
    pub fn axis(&self, actuator: Actuator) -> &PulseStepper<STEP, DIR> {
        &self.axes[actuator.index()]
    }

    /// Advance every actuator by `elapsed_us`
    ///
    /// Returns the actuators that stepped during this poll as a bit mask
    /// (bit 0 for A).
    pub fn poll(&mut self, elapsed_us: u32) -> u8 {
        let mut stepped = 0;
        for (i, axis) in self.axes.iter_mut().enumerate() {
            if axis.poll(elapsed_us) {
                stepped |= 1 << i;
            }
        }
        stepped
    }
}

impl<STEP: OutputPin, DIR: OutputPin> StepGenerator for StageSteppers<STEP, DIR> {
    fn move_to(&mut self, targets: StepCounts, speeds: AxisSpeeds) {
        for actuator in Actuator::ALL {
            self.axes[actuator.index()].move_to(targets[actuator], speeds[actuator]);
        }
    }

    fn run_at_speed(&mut self, actuator: Actuator, steps_per_sec: f32) {
        self.axes[actuator.index()].run_at(steps_per_sec);
    }

    fn is_moving(&self, actuator: Actuator) -> bool {
        self.axes[actuator.index()].is_moving()
    }

    fn emergency_stop(&mut self, actuator: Actuator) {
        self.axes[actuator.index()].stop();
    }

    fn current_position(&self, actuator: Actuator) -> i32 {
        self.axes[actuator.index()].position()
    }

    fn set_current_position(&mut self, actuator: Actuator, steps: i32) {
        self.axes[actuator.index()].set_position(steps);
    }

    fn is_faulted(&self, actuator: Actuator) -> bool {
        self.axes[actuator.index()].is_faulted()
    }
}
