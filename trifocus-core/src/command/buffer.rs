//! Tick-owned active command
//!
//! The active copy is only ever touched by the control tick, so it needs no
//! locking. Promotion copies the whole shadow record in one critical section
//! (see [`CommandPort::take_shadow`]).

use super::port::{CommandPort, ShadowCommand};
use super::ControlMode;
use crate::kinematics::AxisTarget;

/// Active half of the double-buffered command
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    active: AxisTarget,
    mode: ControlMode,
    require_complete_target: bool,
}

impl CommandBuffer {
    /// Create an empty buffer
    ///
    /// With `require_complete_target` set, absolute commands are only
    /// promoted once tip, tilt and focus have all been staged.
    pub fn new(require_complete_target: bool) -> Self {
        Self {
            active: AxisTarget::ZERO,
            mode: ControlMode::Stop,
            require_complete_target,
        }
    }

    /// Promote the staged command if one is ready
    ///
    /// Returns true if `active` changed.
    pub fn check_for_new_command(&mut self, port: &CommandPort) -> bool {
        match port.take_shadow(self.require_complete_target) {
            Some(ShadowCommand { target, mode, .. }) => {
                self.active = target;
                self.mode = mode;
                true
            }
            None => false,
        }
    }

    /// Last promoted target
    pub fn active(&self) -> AxisTarget {
        self.active
    }

    /// Mode of the last promoted target
    pub fn mode(&self) -> ControlMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_staged_nothing_promoted() {
        let port = CommandPort::new();
        let mut buffer = CommandBuffer::new(false);

        assert!(!buffer.check_for_new_command(&port));
        assert_eq!(buffer.active(), AxisTarget::ZERO);
        assert_eq!(buffer.mode(), ControlMode::Stop);
    }

    #[test]
    fn test_interleaved_writes_promote_latest_values() {
        let port = CommandPort::new();
        let mut buffer = CommandBuffer::new(false);
        port.set_control_mode(ControlMode::Absolute);

        port.set_tip_target(0.010).unwrap();
        port.set_tilt_target(-0.002).unwrap();
        port.set_tip_target(0.011).unwrap();
        port.set_focus_target(40.0).unwrap();
        port.set_tilt_target(-0.003).unwrap();

        assert!(buffer.check_for_new_command(&port));
        assert_eq!(buffer.active(), AxisTarget::new(0.011, -0.003, 40.0));
        assert_eq!(buffer.mode(), ControlMode::Absolute);

        // Second command is never mixed with the first
        port.set_focus_target(41.0).unwrap();
        assert!(buffer.check_for_new_command(&port));
        assert_eq!(buffer.active(), AxisTarget::new(0.011, -0.003, 41.0));
        assert!(!buffer.check_for_new_command(&port));
    }

    #[test]
    fn test_active_unchanged_without_promotion() {
        let port = CommandPort::new();
        let mut buffer = CommandBuffer::new(true);
        port.set_control_mode(ControlMode::Absolute);
        port.set_focus_target(12.0).unwrap();

        assert!(!buffer.check_for_new_command(&port));
        assert_eq!(buffer.active(), AxisTarget::ZERO);
        assert!(port.has_pending());
    }
}
