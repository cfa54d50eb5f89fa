//! Foreground-facing command port
//!
//! Everything the foreground and the control tick both touch lives here,
//! and nothing else does. Each shared value is guarded on its own:
//!
//! - the shadow target and mode sit in one `critical_section::Mutex<Cell>`;
//!   every setter is a single short critical section around one field
//! - flags, counters and published status are individual atomics
//!
//! No critical section here ever spans kinematics or storage I/O.

use core::cell::Cell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use super::status::{AxisStatus, Outcome, NOTIFY_NONE};
use super::{CommandError, ControlMode};
use crate::kinematics::{Actuator, AxisTarget, StepCounts};
use crate::motion::limits::LimitFlags;
use crate::state::{Fault, HomingState, MoveState};
use crate::traits::{FieldValue, StatusReport, StepGenerator};

/// Which shadow fields have been written since the last promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdatedFields {
    pub tip: bool,
    pub tilt: bool,
    pub focus: bool,
}

impl UpdatedFields {
    pub const NONE: UpdatedFields = UpdatedFields {
        tip: false,
        tilt: false,
        focus: false,
    };

    pub fn any(&self) -> bool {
        self.tip || self.tilt || self.focus
    }

    pub fn all(&self) -> bool {
        self.tip && self.tilt && self.focus
    }
}

/// The shadow half of the command buffer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShadowCommand {
    /// Staged target (absolute, or a delta in relative mode)
    pub target: AxisTarget,
    /// Mode the target will be interpreted in
    pub mode: ControlMode,
    /// Fields written since the last promotion
    pub updated: UpdatedFields,
}

impl ShadowCommand {
    pub const fn new() -> Self {
        Self {
            target: AxisTarget::ZERO,
            mode: ControlMode::Stop,
            updated: UpdatedFields::NONE,
        }
    }
}

impl Default for ShadowCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state between command handlers and the control tick
///
/// Construct once as a `static` and hand `&CommandPort` to both sides.
pub struct CommandPort {
    shadow: Mutex<Cell<ShadowCommand>>,
    home_request: Mutex<Cell<Option<f32>>>,
    stop_requested: AtomicBool,
    enabled: AtomicBool,
    fan_percent: AtomicU8,
    limits: LimitFlags,

    // Notifiers, polled and cleared by the foreground
    move_notifier: AtomicU8,
    homing_notifier: AtomicU8,

    // Published by the tick at the end of every cycle
    positions: [AtomicI32; 3],
    axis_status: [AtomicU8; 3],
    move_state: AtomicU8,
    homing_state: AtomicU8,
    fault: AtomicU8,
    calibrated: AtomicBool,
}

impl Default for CommandPort {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPort {
    /// Create a port with drivers disabled, mode STOP and nothing staged
    pub const fn new() -> Self {
        Self {
            shadow: Mutex::new(Cell::new(ShadowCommand::new())),
            home_request: Mutex::new(Cell::new(None)),
            stop_requested: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            fan_percent: AtomicU8::new(0),
            limits: LimitFlags::new(),
            move_notifier: AtomicU8::new(NOTIFY_NONE),
            homing_notifier: AtomicU8::new(NOTIFY_NONE),
            positions: [AtomicI32::new(0), AtomicI32::new(0), AtomicI32::new(0)],
            axis_status: [AtomicU8::new(0), AtomicU8::new(0), AtomicU8::new(0)],
            move_state: AtomicU8::new(0),
            homing_state: AtomicU8::new(0),
            fault: AtomicU8::new(0),
            calibrated: AtomicBool::new(false),
        }
    }

    // ---- command handlers (foreground) ----

    /// Select how staged targets are interpreted
    ///
    /// Changing mode drops carried-over values that were not staged since
    /// the last promotion, so an old absolute tip is never read as a delta.
    pub fn set_control_mode(&self, mode: ControlMode) {
        self.modify_shadow(|shadow| {
            if shadow.mode != mode {
                if !shadow.updated.tip {
                    shadow.target.tip = 0.0;
                }
                if !shadow.updated.tilt {
                    shadow.target.tilt = 0.0;
                }
                if !shadow.updated.focus {
                    shadow.target.focus = 0.0;
                }
            }
            shadow.mode = mode;
        });
    }

    /// Stage a tip target in radians
    pub fn set_tip_target(&self, radians: f64) -> Result<(), CommandError> {
        let value = finite(radians)?;
        self.modify_shadow(|shadow| {
            shadow.target.tip = value;
            shadow.updated.tip = true;
        });
        Ok(())
    }

    /// Stage a tilt target in radians
    pub fn set_tilt_target(&self, radians: f64) -> Result<(), CommandError> {
        let value = finite(radians)?;
        self.modify_shadow(|shadow| {
            shadow.target.tilt = value;
            shadow.updated.tilt = true;
        });
        Ok(())
    }

    /// Stage a focus target in microns
    pub fn set_focus_target(&self, microns: f64) -> Result<(), CommandError> {
        let value = finite(microns)?;
        self.modify_shadow(|shadow| {
            shadow.target.focus = value;
            shadow.updated.focus = true;
        });
        Ok(())
    }

    /// Request homing at a raw speed in steps/second
    pub fn go_home(&self, steps_per_sec: f32) -> Result<(), CommandError> {
        if !steps_per_sec.is_finite() || steps_per_sec <= 0.0 {
            return Err(CommandError::InvalidValue);
        }
        critical_section::with(|cs| self.home_request.borrow(cs).set(Some(steps_per_sec)));
        Ok(())
    }

    /// Stop everything now
    ///
    /// Halts the step generator synchronously, drops anything staged and
    /// selects STOP mode. The tick finishes the job (IDLE, homing reset) at
    /// the start of its next cycle.
    pub fn stop_now<G: StepGenerator>(&self, generator: &mut G) {
        critical_section::with(|cs| {
            generator.stop_all();

            let cell = self.shadow.borrow(cs);
            let mut shadow = cell.get();
            shadow.mode = ControlMode::Stop;
            shadow.updated = UpdatedFields::NONE;
            cell.set(shadow);

            self.home_request.borrow(cs).set(None);
            self.stop_requested.store(true, Ordering::Release);
        });
    }

    /// Set the cooling fan duty in percent
    pub fn set_fan_speed(&self, percent: u8) -> Result<(), CommandError> {
        if percent > 100 {
            return Err(CommandError::OutOfRange);
        }
        self.fan_percent.store(percent, Ordering::Release);
        Ok(())
    }

    /// Current fan setting in percent
    pub fn fan_speed(&self) -> u8 {
        self.fan_percent.load(Ordering::Acquire)
    }

    /// Power the actuator drivers on or off
    pub fn enable_steppers(&self, enable: bool) {
        self.enabled.store(enable, Ordering::Release);
    }

    /// Check if the actuator drivers are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    // ---- queries (foreground) ----

    /// Status bits for one actuator, as of the last tick
    pub fn status(&self, actuator: Actuator) -> AxisStatus {
        AxisStatus::from_bits(self.axis_status[actuator.index()].load(Ordering::Acquire))
    }

    /// Raw step position of one actuator, as of the last tick
    pub fn stepper_position(&self, actuator: Actuator) -> i32 {
        self.positions[actuator.index()].load(Ordering::Acquire)
    }

    /// All three positions, as of the last tick
    pub fn positions(&self) -> StepCounts {
        StepCounts::from_fn(|a| self.stepper_position(a))
    }

    /// Move state as of the last tick
    pub fn move_state(&self) -> MoveState {
        MoveState::from_code(self.move_state.load(Ordering::Acquire)).unwrap_or(MoveState::Idle)
    }

    /// Homing sub-state as of the last tick
    pub fn homing_state(&self) -> HomingState {
        HomingState::from_code(self.homing_state.load(Ordering::Acquire))
            .unwrap_or(HomingState::Initialize)
    }

    /// Current stage fault, if any
    pub fn fault(&self) -> Option<Fault> {
        Fault::from_code(self.fault.load(Ordering::Acquire))
    }

    /// Check if the stage has a trusted zero reference
    pub fn is_calibrated(&self) -> bool {
        self.calibrated.load(Ordering::Acquire)
    }

    /// Snapshot of the staged command
    pub fn shadow(&self) -> ShadowCommand {
        critical_section::with(|cs| self.shadow.borrow(cs).get())
    }

    /// Take the move-complete notifier, clearing it
    pub fn take_move_complete(&self) -> Option<Outcome> {
        Outcome::decode(self.move_notifier.swap(NOTIFY_NONE, Ordering::AcqRel))
    }

    /// Take the homing-complete notifier, clearing it
    pub fn take_homing_complete(&self) -> Option<Outcome> {
        Outcome::decode(self.homing_notifier.swap(NOTIFY_NONE, Ordering::AcqRel))
    }

    /// Limit flags, for the switch edge handlers
    pub fn limits(&self) -> &LimitFlags {
        &self.limits
    }

    // ---- control tick side ----

    /// Take the staged command if it is ready to promote
    ///
    /// One critical section: the caller gets a consistent copy and the
    /// updated flags are cleared together. STOP mode holds staged values.
    /// In relative mode the consumed deltas are zeroed so they apply once.
    pub(crate) fn take_shadow(&self, require_complete_target: bool) -> Option<ShadowCommand> {
        critical_section::with(|cs| {
            let cell = self.shadow.borrow(cs);
            let mut shadow = cell.get();
            let ready = match shadow.mode {
                ControlMode::Stop => false,
                ControlMode::Absolute if require_complete_target => shadow.updated.all(),
                _ => shadow.updated.any(),
            };
            if !ready {
                return None;
            }

            let promoted = shadow;
            shadow.updated = UpdatedFields::NONE;
            if shadow.mode == ControlMode::Relative {
                shadow.target = AxisTarget::ZERO;
            }
            cell.set(shadow);
            Some(promoted)
        })
    }

    /// Check if any field is staged but not yet promoted
    pub fn has_pending(&self) -> bool {
        self.shadow().updated.any()
    }

    /// Drop a staged command that was refused
    pub(crate) fn discard_pending(&self) {
        self.modify_shadow(|shadow| {
            shadow.updated = UpdatedFields::NONE;
            if shadow.mode == ControlMode::Relative {
                shadow.target = AxisTarget::ZERO;
            }
        });
    }

    pub(crate) fn take_stop_request(&self) -> bool {
        self.stop_requested.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_home_request(&self) -> Option<f32> {
        critical_section::with(|cs| self.home_request.borrow(cs).take())
    }

    pub(crate) fn notify_move(&self, outcome: Outcome) {
        self.move_notifier.store(outcome.encode(), Ordering::Release);
    }

    pub(crate) fn notify_homing(&self, outcome: Outcome) {
        self.homing_notifier.store(outcome.encode(), Ordering::Release);
    }

    pub(crate) fn publish_axis(&self, actuator: Actuator, position: i32, status: AxisStatus) {
        self.positions[actuator.index()].store(position, Ordering::Release);
        self.axis_status[actuator.index()].store(status.bits(), Ordering::Release);
    }

    pub(crate) fn publish_stage(
        &self,
        state: MoveState,
        homing: HomingState,
        fault: Option<Fault>,
        calibrated: bool,
    ) {
        self.move_state.store(state.code(), Ordering::Release);
        self.homing_state.store(homing.code(), Ordering::Release);
        self.fault.store(fault.map_or(0, Fault::code), Ordering::Release);
        self.calibrated.store(calibrated, Ordering::Release);
    }

    fn modify_shadow(&self, f: impl FnOnce(&mut ShadowCommand)) {
        critical_section::with(|cs| {
            let cell = self.shadow.borrow(cs);
            let mut shadow = cell.get();
            f(&mut shadow);
            cell.set(shadow);
        });
    }
}

impl StatusReport for CommandPort {
    fn label(&self) -> &'static str {
        "pmc"
    }

    fn report(&self, sink: &mut dyn FnMut(&'static str, FieldValue)) {
        let shadow = self.shadow();
        sink("Control mode", FieldValue::Text(shadow.mode.name()));
        sink("Tip cmd (urad)", FieldValue::Float((shadow.target.tip * 1e6) as f32));
        sink("Tilt cmd (urad)", FieldValue::Float((shadow.target.tilt * 1e6) as f32));
        sink("Focus cmd (um)", FieldValue::Float(shadow.target.focus as f32));
        sink("Steppers enabled", FieldValue::Flag(self.is_enabled()));
        sink("Calibrated", FieldValue::Flag(self.is_calibrated()));
        sink("A position", FieldValue::Int(self.stepper_position(Actuator::A)));
        sink("B position", FieldValue::Int(self.stepper_position(Actuator::B)));
        sink("C position", FieldValue::Int(self.stepper_position(Actuator::C)));

        let state = self.move_state();
        let state_name = if state == MoveState::HomingIsActive {
            self.homing_state().name()
        } else {
            state.name()
        };
        sink("Move state", FieldValue::Text(state_name));
        sink("Fault code", FieldValue::Int(self.fault().map_or(0, |f| f.code() as i32)));
    }
}

fn finite(value: f64) -> Result<f64, CommandError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CommandError::InvalidValue)
    }
}
