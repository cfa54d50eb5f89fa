//! Limit switch flags and interrupt handler
//!
//! One flag per actuator, set from the switch's edge handler and cleared by
//! the control tick once it has acted on it. The handler does nothing but
//! set the flag and cut that actuator's pulses.

use portable_atomic::{AtomicBool, Ordering};

use crate::kinematics::Actuator;
use crate::traits::StepGenerator;

/// "Limit reached" flags, one per actuator
#[derive(Debug)]
pub struct LimitFlags {
    flags: [AtomicBool; 3],
}

impl Default for LimitFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl LimitFlags {
    pub const fn new() -> Self {
        Self {
            flags: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
        }
    }

    /// Record that the actuator reached its switch
    pub fn set(&self, actuator: Actuator) {
        self.flags[actuator.index()].store(true, Ordering::Release);
    }

    /// Check the flag for one actuator
    pub fn is_set(&self, actuator: Actuator) -> bool {
        self.flags[actuator.index()].load(Ordering::Acquire)
    }

    /// First actuator with its flag set, in A, B, C order
    pub fn first_set(&self) -> Option<Actuator> {
        Actuator::ALL.into_iter().find(|&a| self.is_set(a))
    }

    /// Check if any flag is set
    pub fn any(&self) -> bool {
        self.first_set().is_some()
    }

    /// Clear one flag
    pub fn clear(&self, actuator: Actuator) {
        self.flags[actuator.index()].store(false, Ordering::Release);
    }

    /// Clear every flag
    pub fn clear_all(&self) {
        for actuator in Actuator::ALL {
            self.clear(actuator);
        }
    }
}

/// Limit switch edge handler
///
/// Call from the asserting edge of an actuator's switch. Bounded work only:
/// one flag store and one immediate stop.
pub fn on_limit_switch<G: StepGenerator>(flags: &LimitFlags, generator: &mut G, actuator: Actuator) {
    flags.set(actuator);
    generator.emergency_stop(actuator);
}
