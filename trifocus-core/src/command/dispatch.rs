//! Request dispatch
//!
//! Maps parsed protocol requests onto [`CommandPort`] calls and builds the
//! immediate reply. Completion of moves and homing runs is reported later,
//! from the notifiers.

use trifocus_protocol::{Reply, Request, HANDSHAKE_REQUEST};

use super::{CommandError, CommandPort, ControlMode};
use crate::kinematics::{Actuator, MirrorGeometry};
use crate::traits::StepGenerator;

/// Apply one request
///
/// Returns `None` for requests that are silently accepted (target and
/// mode setters, unanswered handshakes).
pub fn dispatch<G: StepGenerator>(
    request: Request,
    port: &CommandPort,
    generator: &mut G,
    geometry: &MirrorGeometry,
    default_home_speed: f32,
) -> Option<Reply> {
    let result = match request {
        Request::Handshake(value) => {
            return (value == HANDSHAKE_REQUEST).then_some(Reply::Handshake);
        }
        Request::MoveType(code) => ControlMode::from_code(code)
            .ok_or(CommandError::UnknownMode)
            .map(|mode| port.set_control_mode(mode)),
        Request::SetTip(value) => port.set_tip_target(value),
        Request::SetTilt(value) => port.set_tilt_target(value),
        Request::SetFocus(value) => port.set_focus_target(value),
        Request::FindHome(speed) => {
            let speed = if speed == 0.0 { default_home_speed } else { speed };
            return Some(match port.go_home(speed) {
                Ok(()) => Reply::FindingHome,
                Err(e) => Reply::Error(e.code()),
            });
        }
        Request::GetStatus => {
            return Some(Reply::Status(Actuator::ALL.map(|a| port.status(a).bits())));
        }
        Request::GetPositions => {
            return Some(Reply::Positions(
                Actuator::ALL.map(|a| port.stepper_position(a)),
            ));
        }
        Request::GetEstimate => {
            let estimate = geometry.target_for(&port.positions());
            return Some(Reply::Estimate {
                tip: estimate.tip,
                tilt: estimate.tilt,
                focus: estimate.focus,
            });
        }
        Request::Stop => {
            port.stop_now(generator);
            return Some(Reply::Stopped);
        }
        Request::SetFanSpeed(percent) => {
            return Some(match port.set_fan_speed(percent) {
                Ok(()) => Reply::Ok(request.key()),
                Err(e) => Reply::Error(e.code()),
            });
        }
        Request::Enable(enable) => {
            port.enable_steppers(enable);
            return Some(Reply::Ok(request.key()));
        }
    };

    result.err().map(|e| Reply::Error(e.code()))
}
