//! Message types for the stage protocol
//!
//! Messages are divided into two categories:
//! - Host → Stage: [`Request`], one `Key=Value` line each
//! - Stage → Host: [`Reply`], same line format
//!
//! Query requests (`GetStatus`, `GetPositions`, `GetEstimate`, `Stop`)
//! accept and ignore a value, since some hosts always send one.

use core::fmt::Write;

use heapless::String;

use crate::line::MAX_LINE_LEN;

/// Value a host sends with `Handshake`
pub const HANDSHAKE_REQUEST: u32 = 0xDEAD;

/// Value the stage answers a valid handshake with
pub const HANDSHAKE_REPLY: u32 = 0xBEEF;

/// Protocol-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Key not recognised
    UnknownKey,
    /// Key needs a value and none was given
    MissingValue,
    /// Value could not be parsed for its key
    InvalidValue,
    /// Line exceeded the maximum length
    LineTooLong,
}

impl ParseError {
    /// Code carried in an `Error=<code>` reply
    pub fn code(self) -> u8 {
        match self {
            ParseError::UnknownKey => 0x01,
            ParseError::MissingValue => 0x02,
            ParseError::InvalidValue => 0x03,
            ParseError::LineTooLong => 0x04,
        }
    }
}

/// Requests from the host
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Connection check; the stage only answers [`HANDSHAKE_REQUEST`]
    Handshake(u32),
    /// Select the control mode by code (0 stop, 1 relative, 2 absolute)
    MoveType(u8),
    /// Start homing at this speed in steps/second (0 = configured default)
    FindHome(f32),
    /// Stage a tip target in radians
    SetTip(f64),
    /// Stage a tilt target in radians
    SetTilt(f64),
    /// Stage a focus target in microns
    SetFocus(f64),
    /// Query per-axis status bits
    GetStatus,
    /// Query raw actuator step positions
    GetPositions,
    /// Stop all motion immediately
    Stop,
    /// Set the cooling fan in percent
    SetFanSpeed(u8),
    /// Enable (`1`) or disable (`0`) the actuator drivers
    Enable(bool),
    /// Query the tip/tilt/focus estimate from current positions
    GetEstimate,
}

impl Request {
    /// Parse a request from one line (without terminator)
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (line.trim(), None),
        };

        let value = value.filter(|v| !v.is_empty());
        let required = || value.ok_or(ParseError::MissingValue);

        match key {
            "Handshake" => Ok(Request::Handshake(parse_u32(required()?)?)),
            "MoveType" => Ok(Request::MoveType(parse_num(required()?)?)),
            "FindHome" => match value {
                Some(v) => Ok(Request::FindHome(parse_num(v)?)),
                None => Ok(Request::FindHome(0.0)),
            },
            "SetTip" => Ok(Request::SetTip(parse_num(required()?)?)),
            "SetTilt" => Ok(Request::SetTilt(parse_num(required()?)?)),
            "SetFocus" => Ok(Request::SetFocus(parse_num(required()?)?)),
            "GetStatus" => Ok(Request::GetStatus),
            "GetPositions" => Ok(Request::GetPositions),
            "Stop" => Ok(Request::Stop),
            "SetFanSpeed" => Ok(Request::SetFanSpeed(parse_num(required()?)?)),
            "Enable" => match parse_num::<u8>(required()?)? {
                0 => Ok(Request::Enable(false)),
                1 => Ok(Request::Enable(true)),
                _ => Err(ParseError::InvalidValue),
            },
            "GetEstimate" => Ok(Request::GetEstimate),
            _ => Err(ParseError::UnknownKey),
        }
    }

    /// Protocol key of this request
    pub fn key(&self) -> &'static str {
        match self {
            Request::Handshake(_) => "Handshake",
            Request::MoveType(_) => "MoveType",
            Request::FindHome(_) => "FindHome",
            Request::SetTip(_) => "SetTip",
            Request::SetTilt(_) => "SetTilt",
            Request::SetFocus(_) => "SetFocus",
            Request::GetStatus => "GetStatus",
            Request::GetPositions => "GetPositions",
            Request::Stop => "Stop",
            Request::SetFanSpeed(_) => "SetFanSpeed",
            Request::Enable(_) => "Enable",
            Request::GetEstimate => "GetEstimate",
        }
    }

    /// Encode this request as a line (for testing or simulation)
    pub fn to_line(&self) -> Result<String<MAX_LINE_LEN>, core::fmt::Error> {
        let mut line = String::new();
        let key = self.key();
        match *self {
            Request::Handshake(v) => write!(line, "{}={:#X}", key, v)?,
            Request::MoveType(v) => write!(line, "{}={}", key, v)?,
            Request::FindHome(v) => write!(line, "{}={}", key, v)?,
            Request::SetTip(v) | Request::SetTilt(v) | Request::SetFocus(v) => {
                write!(line, "{}={}", key, v)?
            }
            Request::SetFanSpeed(v) => write!(line, "{}={}", key, v)?,
            Request::Enable(v) => write!(line, "{}={}", key, v as u8)?,
            Request::GetStatus | Request::GetPositions | Request::Stop | Request::GetEstimate => {
                write!(line, "{}=0", key)?
            }
        }
        Ok(line)
    }
}

/// Replies to the host
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Handshake accepted
    Handshake,
    /// A move finished normally
    MoveComplete,
    /// A move ended with this fault code
    MoveFault(u8),
    /// Homing finished; the stage is calibrated
    HomeComplete,
    /// Homing ended with this fault code
    HomeFault(u8),
    /// Status bits for actuators A, B and C
    Status([u8; 3]),
    /// Raw step positions for actuators A, B and C
    Positions([i32; 3]),
    /// Tip and tilt in radians, focus in microns
    Estimate { tip: f64, tilt: f64, focus: f64 },
    /// Stop applied
    Stopped,
    /// Homing request accepted
    FindingHome,
    /// Request with this key applied
    Ok(&'static str),
    /// Request rejected with this code
    Error(u8),
}

impl Reply {
    /// Encode this reply as a line, without terminator
    pub fn to_line(&self) -> Result<String<MAX_LINE_LEN>, core::fmt::Error> {
        let mut line = String::new();
        match *self {
            Reply::Handshake => write!(line, "Handshake={:#X}", HANDSHAKE_REPLY)?,
            Reply::MoveComplete => write!(line, "MoveComplete={:#X}", HANDSHAKE_REPLY)?,
            Reply::MoveFault(code) => write!(line, "MoveFault={:#04X}", code)?,
            Reply::HomeComplete => write!(line, "HomeComplete={:#X}", HANDSHAKE_REPLY)?,
            Reply::HomeFault(code) => write!(line, "HomeFault={:#04X}", code)?,
            Reply::Status([a, b, c]) => write!(line, "Status=A:{},B:{},C:{}", a, b, c)?,
            Reply::Positions([a, b, c]) => write!(line, "Positions={},{},{}", a, b, c)?,
            Reply::Estimate { tip, tilt, focus } => {
                write!(line, "Estimate={:.7},{:.7},{:.3}", tip, tilt, focus)?
            }
            Reply::Stopped => line.push_str("Stopped=$OK^").map_err(|_| core::fmt::Error)?,
            Reply::FindingHome => line
                .push_str("FindingHome=$OK^")
                .map_err(|_| core::fmt::Error)?,
            Reply::Ok(key) => write!(line, "Ok={}", key)?,
            Reply::Error(code) => write!(line, "Error={:#04X}", code)?,
        }
        Ok(line)
    }
}

fn parse_num<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Integer in decimal or `0x`-prefixed hex
fn parse_u32(value: &str) -> Result<u32, ParseError> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| ParseError::InvalidValue),
        None => parse_num(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_handshake_hex_and_decimal() {
        assert_eq!(Request::parse("Handshake=0xDEAD"), Ok(Request::Handshake(0xDEAD)));
        assert_eq!(Request::parse("Handshake=57005"), Ok(Request::Handshake(0xDEAD)));
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(Request::parse("SetTip=0.01"), Ok(Request::SetTip(0.01)));
        assert_eq!(Request::parse("SetTilt = -0.002"), Ok(Request::SetTilt(-0.002)));
        assert_eq!(Request::parse("SetFocus=50"), Ok(Request::SetFocus(50.0)));
    }

    #[test]
    fn test_parse_queries_ignore_value() {
        assert_eq!(Request::parse("GetStatus=0"), Ok(Request::GetStatus));
        assert_eq!(Request::parse("GetStatus"), Ok(Request::GetStatus));
        assert_eq!(Request::parse("Stop=1.0"), Ok(Request::Stop));
    }

    #[test]
    fn test_parse_find_home_default_speed() {
        assert_eq!(Request::parse("FindHome"), Ok(Request::FindHome(0.0)));
        assert_eq!(Request::parse("FindHome=800"), Ok(Request::FindHome(800.0)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Request::parse("Launch=1"), Err(ParseError::UnknownKey));
        assert_eq!(Request::parse("SetTip="), Err(ParseError::MissingValue));
        assert_eq!(Request::parse("SetTip"), Err(ParseError::MissingValue));
        assert_eq!(Request::parse("SetTip=abc"), Err(ParseError::InvalidValue));
        assert_eq!(Request::parse("Enable=2"), Err(ParseError::InvalidValue));
        assert_eq!(Request::parse("SetFanSpeed=300"), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_reply_lines() {
        assert_eq!(Reply::Handshake.to_line().unwrap().as_str(), "Handshake=0xBEEF");
        assert_eq!(Reply::MoveComplete.to_line().unwrap().as_str(), "MoveComplete=0xBEEF");
        assert_eq!(Reply::MoveFault(0x11).to_line().unwrap().as_str(), "MoveFault=0x11");
        assert_eq!(Reply::Status([4, 0, 1]).to_line().unwrap().as_str(), "Status=A:4,B:0,C:1");
        assert_eq!(
            Reply::Positions([282, 259, -7]).to_line().unwrap().as_str(),
            "Positions=282,259,-7"
        );
        assert_eq!(Reply::Stopped.to_line().unwrap().as_str(), "Stopped=$OK^");
        assert_eq!(Reply::Ok("Enable").to_line().unwrap().as_str(), "Ok=Enable");
        assert_eq!(Reply::Error(0x03).to_line().unwrap().as_str(), "Error=0x03");
    }

    #[test]
    fn test_estimate_reply_fits_line() {
        let reply = Reply::Estimate {
            tip: -0.0499999,
            tilt: 0.0499999,
            focus: -99999.999,
        };
        assert!(reply.to_line().is_ok());
    }

    proptest! {
        #[test]
        fn test_target_requests_survive_encoding(value in -1.0e4f64..1.0e4) {
            for request in [Request::SetTip(value), Request::SetTilt(value), Request::SetFocus(value)] {
                let line = request.to_line().unwrap();
                prop_assert_eq!(Request::parse(&line), Ok(request));
            }
        }

        #[test]
        fn test_parse_never_panics(line in "\\PC{0,64}") {
            let _ = Request::parse(&line);
        }
    }
}
