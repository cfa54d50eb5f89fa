//! Per-axis status bits and notifier outcomes

use crate::state::Fault;

const FAULTED_BIT: u8 = 0b001;
const HOME_BIT: u8 = 0b010;
const MOVING_BIT: u8 = 0b100;

/// Status bits for one actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisStatus {
    /// Driver fault, or a stage fault that covers this actuator
    pub faulted: bool,
    /// Calibrated and sitting on the home position
    pub home: bool,
    /// Step generator is running this actuator
    pub moving: bool,
}

impl AxisStatus {
    /// Pack into the wire bit pattern
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.faulted {
            bits |= FAULTED_BIT;
        }
        if self.home {
            bits |= HOME_BIT;
        }
        if self.moving {
            bits |= MOVING_BIT;
        }
        bits
    }

    /// Unpack the wire bit pattern (unknown bits are ignored)
    pub fn from_bits(bits: u8) -> Self {
        Self {
            faulted: bits & FAULTED_BIT != 0,
            home: bits & HOME_BIT != 0,
            moving: bits & MOVING_BIT != 0,
        }
    }
}

/// Result carried by the move-complete and homing-complete notifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Finished normally
    Completed,
    /// Ended by a fault
    Faulted(Fault),
}

/// Notifier value meaning "nothing to report"
pub(crate) const NOTIFY_NONE: u8 = 0;

/// Notifier value for [`Outcome::Completed`]; fault codes are never 1
const NOTIFY_COMPLETED: u8 = 1;

impl Outcome {
    pub(crate) fn encode(self) -> u8 {
        match self {
            Outcome::Completed => NOTIFY_COMPLETED,
            Outcome::Faulted(fault) => fault.code(),
        }
    }

    pub(crate) fn decode(code: u8) -> Option<Self> {
        match code {
            NOTIFY_NONE => None,
            NOTIFY_COMPLETED => Some(Outcome::Completed),
            other => Fault::from_code(other).map(Outcome::Faulted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Actuator;

    #[test]
    fn test_status_bits() {
        let status = AxisStatus {
            faulted: true,
            home: false,
            moving: true,
        };
        assert_eq!(status.bits(), 0b101);
        assert_eq!(AxisStatus::from_bits(0b101), status);
        assert_eq!(AxisStatus::from_bits(0xF8), AxisStatus::default());
    }

    #[test]
    fn test_outcome_encoding() {
        assert_eq!(Outcome::decode(NOTIFY_NONE), None);
        assert_eq!(
            Outcome::decode(Outcome::Completed.encode()),
            Some(Outcome::Completed)
        );

        let faulted = Outcome::Faulted(Fault::LimitStrike(Actuator::C));
        assert_eq!(Outcome::decode(faulted.encode()), Some(faulted));
    }
}
