//! Limit switch level inputs

use crate::kinematics::Actuator;

/// Current level of the home limit switches
///
/// Edges arrive through [`crate::motion::limits::on_limit_switch`]; this
/// trait is only for reading whether a switch is pressed right now, which
/// homing needs when it starts on a switch or backs off one.
pub trait LimitInputs {
    /// Check if the actuator's limit switch is currently pressed
    fn is_asserted(&self, actuator: Actuator) -> bool;
}

/// Snapshot of the three switch levels, indexed by [`Actuator::index`]
impl LimitInputs for [bool; 3] {
    fn is_asserted(&self, actuator: Actuator) -> bool {
        self[actuator.index()]
    }
}
