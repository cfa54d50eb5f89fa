//! Line framing
//!
//! Splits an incoming byte stream into `\n`-terminated lines. A trailing
//! `\r` is dropped, so both `\n` and `\r\n` endings are accepted. Lines
//! longer than [`MAX_LINE_LEN`] are discarded up to the next newline.

use heapless::{String, Vec};

use crate::messages::ParseError;

/// Maximum line length in bytes, excluding the terminator
pub const MAX_LINE_LEN: usize = 64;

/// State machine for splitting incoming bytes into lines
#[derive(Debug, Clone)]
pub struct LineParser {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Create a new line parser
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(line))` when a complete line is available,
    /// `Ok(None)` when more bytes are needed, or `Err` at the end of an
    /// over-long or non-UTF-8 line. Empty lines are skipped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<String<MAX_LINE_LEN>>, ParseError> {
        match byte {
            b'\n' => {
                if self.overflowed {
                    self.reset();
                    return Err(ParseError::LineTooLong);
                }

                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }

                let bytes = core::mem::take(&mut self.buffer);
                if bytes.is_empty() {
                    return Ok(None);
                }
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| ParseError::InvalidValue)
            }
            _ if self.overflowed => Ok(None),
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.overflowed = true;
                }
                Ok(None)
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete line found, if any, along with the number
    /// of bytes consumed. Bytes after that line are left for the next call.
    pub fn feed_bytes(
        &mut self,
        bytes: &[u8],
    ) -> (usize, Result<Option<String<MAX_LINE_LEN>>, ParseError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => {}
                result => return (i + 1, result),
            }
        }
        (bytes.len(), Ok(None))
    }
}
