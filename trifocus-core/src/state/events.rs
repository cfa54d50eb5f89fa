//! Events that drive the move state machine

/// Events raised by the control tick while sequencing a move or homing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Command events
    /// A staged command was promoted from shadow to active
    CommandPromoted,
    /// Step targets were computed and handed to the step generator
    MoveStarted,
    /// The promoted command was refused or selected STOP
    MoveCancelled,
    /// A command promoted mid-move was refused; the running move carries on
    RetargetRefused,

    // Motion events
    /// The step generator reports every actuator idle
    MotionFinished,
    /// A limit switch fired outside homing
    LimitTripped,
    /// Completion or fault has been reported to the foreground
    OutcomeReported,

    // Homing events
    /// A homing request was accepted
    HomingRequested,
    /// All three actuators found home
    HomingFinished,
    /// Homing gave up (timeout or disable)
    HomingAborted,

    // Override
    /// Stop command or driver disable
    Stop,
}

impl Event {
    /// Check if this event ends a homing run
    pub fn ends_homing(&self) -> bool {
        matches!(
            self,
            Event::HomingFinished | Event::HomingAborted | Event::Stop
        )
    }
}
