//! Move and homing state definitions
//!
//! The stage is in exactly one [`MoveState`] at a time. All move behavior
//! is a function of that state and an [`Event`]; the homing sub-sequence
//! reports its progress through [`HomingState`].

use super::events::Event;
use crate::kinematics::Actuator;

/// Motion state of the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MoveState {
    /// Holding position, waiting for a command
    Idle = 0,
    /// A command was just promoted; targets not yet submitted
    NewMoveCmd = 1,
    /// Step generator is executing a move
    MoveInProgress = 2,
    /// Move finished; result not yet reported
    MoveComplete = 3,
    /// Limit switch hit during a move
    LimitSwDetect = 4,
    /// Homing sequence owns the actuators
    HomingIsActive = 5,
}

/// Homing sub-state, meaningful only while homing is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HomingState {
    /// Clear limit flags and start the fast seek
    Initialize = 0,
    /// Fast seek toward the switches
    Step1 = 1,
    /// Settle pause on the switches
    Step2 = 2,
    /// Back off until the switches release
    Step3 = 3,
    /// Settle pause before the final approach
    Step4 = 4,
    /// Slow seek; the trip point becomes the zero reference
    Step5 = 5,
}

/// Faults reported through the status interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Limit switch hit outside homing, or a move aimed further into an
    /// asserted switch
    LimitStrike(Actuator),
    /// No valid stored position; homing required
    NotCalibrated,
    /// Motion requested while the drivers are disabled
    Disabled,
    /// Homing made no progress within the configured timeout
    HomingTimeout(Actuator),
    /// Target outside the configured angle or stroke range
    OutOfRange,
}

impl MoveState {
    /// Check if the actuators may be moving in this state
    pub fn is_active(&self) -> bool {
        !matches!(self, MoveState::Idle)
    }

    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MoveState::Idle),
            1 => Some(MoveState::NewMoveCmd),
            2 => Some(MoveState::MoveInProgress),
            3 => Some(MoveState::MoveComplete),
            4 => Some(MoveState::LimitSwDetect),
            5 => Some(MoveState::HomingIsActive),
            _ => None,
        }
    }

    /// Human-readable state name
    pub fn name(self) -> &'static str {
        match self {
            MoveState::Idle => "IDLE",
            MoveState::NewMoveCmd => "NEW MOVE CMD",
            MoveState::MoveInProgress => "MOVE IN PROGRESS",
            MoveState::MoveComplete => "MOVE COMPLETE",
            MoveState::LimitSwDetect => "LIMIT SW DETECT",
            MoveState::HomingIsActive => "HOMING",
        }
    }

    /// Process an event and return the next state
    ///
    /// Pairs not listed leave the state unchanged.
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use MoveState::*;

        match (self, event) {
            // Stop wins from anywhere
            (_, Stop) => Idle,

            // Idle transitions
            (Idle, CommandPromoted) => NewMoveCmd,
            (Idle, HomingRequested) => HomingIsActive,

            // New command transitions
            (NewMoveCmd, MoveStarted) => MoveInProgress,
            (NewMoveCmd, MoveCancelled) => Idle,
            (NewMoveCmd, RetargetRefused) => MoveInProgress,
            (NewMoveCmd, HomingRequested) => HomingIsActive,

            // Move in progress transitions
            (MoveInProgress, MotionFinished) => MoveComplete,
            (MoveInProgress, LimitTripped) => LimitSwDetect,
            (MoveInProgress, CommandPromoted) => NewMoveCmd,

            // Reporting transitions
            (MoveComplete, OutcomeReported) => Idle,
            (LimitSwDetect, OutcomeReported) => Idle,

            // Homing transitions
            (HomingIsActive, HomingFinished) => Idle,
            (HomingIsActive, HomingAborted) => Idle,

            // No transition
            (state, _) => state,
        }
    }
}

impl HomingState {
    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(HomingState::Initialize),
            1 => Some(HomingState::Step1),
            2 => Some(HomingState::Step2),
            3 => Some(HomingState::Step3),
            4 => Some(HomingState::Step4),
            5 => Some(HomingState::Step5),
            _ => None,
        }
    }

    /// Human-readable phase name
    pub fn name(self) -> &'static str {
        match self {
            HomingState::Initialize => "HOMING INIT",
            HomingState::Step1 => "HOMING 1 (QUICK REVERSE)",
            HomingState::Step2 => "HOMING 2 (PAUSE)",
            HomingState::Step3 => "HOMING 3 (SHORT FORWARD)",
            HomingState::Step4 => "HOMING 4 (PAUSE)",
            HomingState::Step5 => "HOMING 5 (SLOW REVERSE)",
        }
    }
}

impl Fault {
    /// Check if this fault blocks new moves until cleared by stop or homing
    pub fn is_latching(&self) -> bool {
        matches!(self, Fault::LimitStrike(_))
    }

    /// The actuator this fault names, if it is specific to one
    pub fn actuator(&self) -> Option<Actuator> {
        match self {
            Fault::LimitStrike(a) | Fault::HomingTimeout(a) => Some(*a),
            _ => None,
        }
    }

    /// Check if this fault marks the given actuator as faulted
    pub fn affects(&self, actuator: Actuator) -> bool {
        self.actuator().map_or(true, |a| a == actuator)
    }

    /// Status code (never zero)
    pub fn code(self) -> u8 {
        match self {
            Fault::LimitStrike(a) => 0x10 + a.index() as u8,
            Fault::NotCalibrated => 0x20,
            Fault::Disabled => 0x21,
            Fault::OutOfRange => 0x22,
            Fault::HomingTimeout(a) => 0x30 + a.index() as u8,
        }
    }

    /// Decode a status code
    pub fn from_code(code: u8) -> Option<Self> {
        let actuator = || Actuator::from_index((code & 0x0F) as usize);
        match code {
            0x10..=0x12 => actuator().map(Fault::LimitStrike),
            0x20 => Some(Fault::NotCalibrated),
            0x21 => Some(Fault::Disabled),
            0x22 => Some(Fault::OutOfRange),
            0x30..=0x32 => actuator().map(Fault::HomingTimeout),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [MoveState; 6] = [
        MoveState::Idle,
        MoveState::NewMoveCmd,
        MoveState::MoveInProgress,
        MoveState::MoveComplete,
        MoveState::LimitSwDetect,
        MoveState::HomingIsActive,
    ];

    #[test]
    fn test_move_lifecycle() {
        let state = MoveState::Idle
            .transition(Event::CommandPromoted)
            .transition(Event::MoveStarted);
        assert_eq!(state, MoveState::MoveInProgress);

        let state = state.transition(Event::MotionFinished);
        assert_eq!(state, MoveState::MoveComplete);

        assert_eq!(state.transition(Event::OutcomeReported), MoveState::Idle);
    }

    #[test]
    fn test_limit_during_move() {
        let state = MoveState::MoveInProgress.transition(Event::LimitTripped);
        assert_eq!(state, MoveState::LimitSwDetect);
        assert_eq!(state.transition(Event::OutcomeReported), MoveState::Idle);
    }

    #[test]
    fn test_refused_retarget_resumes_move() {
        let state = MoveState::MoveInProgress
            .transition(Event::CommandPromoted)
            .transition(Event::RetargetRefused);
        assert_eq!(state, MoveState::MoveInProgress);
        assert_eq!(
            MoveState::Idle.transition(Event::RetargetRefused),
            MoveState::Idle
        );
    }

    #[test]
    fn test_limit_ignored_while_idle() {
        assert_eq!(
            MoveState::Idle.transition(Event::LimitTripped),
            MoveState::Idle
        );
    }

    #[test]
    fn test_stop_from_every_state() {
        for state in ALL_STATES {
            assert_eq!(state.transition(Event::Stop), MoveState::Idle);
        }
    }

    #[test]
    fn test_homing_only_preempts_idle_and_new_command() {
        assert_eq!(
            MoveState::Idle.transition(Event::HomingRequested),
            MoveState::HomingIsActive
        );
        assert_eq!(
            MoveState::NewMoveCmd.transition(Event::HomingRequested),
            MoveState::HomingIsActive
        );
        assert_eq!(
            MoveState::MoveInProgress.transition(Event::HomingRequested),
            MoveState::MoveInProgress
        );
    }

    #[test]
    fn test_homing_ignores_move_events() {
        let state = MoveState::HomingIsActive;
        assert_eq!(state.transition(Event::CommandPromoted), state);
        assert_eq!(state.transition(Event::MotionFinished), state);
        assert_eq!(state.transition(Event::HomingAborted), MoveState::Idle);
    }

    #[test]
    fn test_retarget_mid_move() {
        assert_eq!(
            MoveState::MoveInProgress.transition(Event::CommandPromoted),
            MoveState::NewMoveCmd
        );
    }

    #[test]
    fn test_state_codes() {
        for state in ALL_STATES {
            assert_eq!(MoveState::from_code(state.code()), Some(state));
        }
        assert_eq!(MoveState::from_code(6), None);
    }

    #[test]
    fn test_fault_codes() {
        let faults = [
            Fault::LimitStrike(Actuator::B),
            Fault::NotCalibrated,
            Fault::Disabled,
            Fault::OutOfRange,
            Fault::HomingTimeout(Actuator::C),
        ];
        for fault in faults {
            assert_ne!(fault.code(), 0);
            assert_eq!(Fault::from_code(fault.code()), Some(fault));
        }
        assert_eq!(Fault::from_code(0x13), None);
    }

    #[test]
    fn test_fault_scope() {
        let strike = Fault::LimitStrike(Actuator::A);
        assert!(strike.is_latching());
        assert!(strike.affects(Actuator::A));
        assert!(!strike.affects(Actuator::B));
        assert!(Fault::NotCalibrated.affects(Actuator::C));
        assert!(!Fault::Disabled.is_latching());
    }
}
