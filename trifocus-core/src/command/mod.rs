//! Command intake shared between the foreground and the control tick
//!
//! Command handlers stage values in [`CommandPort`]; the control tick
//! promotes them into its private [`CommandBuffer`] at the start of a tick.
//! [`dispatch`] maps protocol requests onto the port.

pub mod buffer;
pub mod dispatch;
pub mod port;
pub mod status;

pub use buffer::CommandBuffer;
pub use dispatch::dispatch;
pub use port::{CommandPort, ShadowCommand, UpdatedFields};
pub use status::{AxisStatus, Outcome};

/// How a promoted target is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlMode {
    /// Hold position; staged values wait for a move mode
    #[default]
    Stop = 0,
    /// Target is a delta added to the last commanded step counts
    Relative = 1,
    /// Target replaces the commanded position
    Absolute = 2,
}

impl ControlMode {
    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ControlMode::Stop),
            1 => Some(ControlMode::Relative),
            2 => Some(ControlMode::Absolute),
            _ => None,
        }
    }

    /// Human-readable mode name
    pub fn name(self) -> &'static str {
        match self {
            ControlMode::Stop => "STOP",
            ControlMode::Relative => "RELATIVE",
            ControlMode::Absolute => "ABSOLUTE",
        }
    }
}

/// Errors returned to command handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// NaN, infinite or non-positive where a positive value is required
    InvalidValue,
    /// Value outside its documented range
    OutOfRange,
    /// Control mode code not recognised
    UnknownMode,
}

impl CommandError {
    /// Code carried in an `Error=<code>` reply
    pub fn code(self) -> u8 {
        match self {
            CommandError::InvalidValue => 0x41,
            CommandError::OutOfRange => 0x42,
            CommandError::UnknownMode => 0x43,
        }
    }
}
