//! Step generator trait
//!
//! Abstracts the synchronized multi-axis step-pulse generator. The control
//! tick only ever asks it to start, stop and report; pulse timing belongs
//! to the implementation.

use crate::kinematics::{Actuator, AxisSpeeds, StepCounts};

/// Trait for the three-axis step-pulse generator
///
/// Positions are raw step counts in the generator's own frame. Every
/// method must be bounded and non-blocking: `emergency_stop` in particular
/// is called from limit-switch handlers.
pub trait StepGenerator {
    /// Move every actuator to an absolute position
    ///
    /// `speeds` are unsigned rates in steps/second; the direction follows
    /// from the target. An actuator already at its target, or with zero
    /// speed, stays put.
    fn move_to(&mut self, targets: StepCounts, speeds: AxisSpeeds);

    /// Run one actuator at a constant signed velocity with no endpoint
    ///
    /// Negative speeds move toward the home switches.
    fn run_at_speed(&mut self, actuator: Actuator, steps_per_sec: f32);

    /// Check if the actuator is currently stepping
    fn is_moving(&self, actuator: Actuator) -> bool;

    /// Halt the actuator immediately, without deceleration
    fn emergency_stop(&mut self, actuator: Actuator);

    /// Current raw position in steps
    fn current_position(&self, actuator: Actuator) -> i32;

    /// Redefine the current raw position without moving
    fn set_current_position(&mut self, actuator: Actuator, steps: i32);

    /// Check if the driver reports a fault for this actuator
    fn is_faulted(&self, _actuator: Actuator) -> bool {
        false
    }

    /// Check if any actuator is stepping
    fn any_moving(&self) -> bool {
        Actuator::ALL.iter().any(|&a| self.is_moving(a))
    }

    /// Halt every actuator immediately
    fn stop_all(&mut self) {
        for actuator in Actuator::ALL {
            self.emergency_stop(actuator);
        }
    }

    /// Snapshot of all three raw positions
    fn positions(&self) -> StepCounts {
        StepCounts::from_fn(|a| self.current_position(a))
    }
}
