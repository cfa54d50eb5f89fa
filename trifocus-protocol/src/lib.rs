//! Stage command protocol
//!
//! This crate defines the text protocol between the observatory control
//! system and the stage controller. Every message is one ASCII line:
//!
//! ```text
//! Key=Value\n
//! ```
//!
//! Requests set targets, select the move type, start homing and query
//! status. Replies acknowledge requests and report completion of moves and
//! homing runs. Parsing never allocates; lines are bounded by
//! [`MAX_LINE_LEN`].

#![no_std]
#![deny(unsafe_code)]

pub mod line;
pub mod messages;

pub use line::{LineParser, MAX_LINE_LEN};
pub use messages::{ParseError, Reply, Request, HANDSHAKE_REPLY, HANDSHAKE_REQUEST};
