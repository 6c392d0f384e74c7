// ABOUTME: SMPP time fields (schedule_delivery_time, validity_period, final_date)
// ABOUTME: Validates the YYMMDDhhmmsstnnp layout; empty means "SMSC default / immediate"

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateTimeError {
    #[error("invalid time length: {actual} chars (expected 0 or 16)")]
    InvalidLength { actual: usize },

    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { position: usize, character: char },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u8 },
}

/// YY MM DD hh mm ss t nn p, where p is `+`/`-` for absolute times relative
/// to UTC and `R` for a relative period.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SmppDateTime(String);

impl SmppDateTime {
    pub fn new(value: &str) -> Result<Self, DateTimeError> {
        if value.is_empty() {
            return Ok(Self::immediate());
        }
        if value.len() != 16 {
            return Err(DateTimeError::InvalidLength {
                actual: value.len(),
            });
        }

        let bytes = value.as_bytes();
        for (position, &byte) in bytes[..15].iter().enumerate() {
            if !byte.is_ascii_digit() {
                return Err(DateTimeError::InvalidCharacter {
                    position,
                    character: byte as char,
                });
            }
        }
        let sign = bytes[15];
        if !matches!(sign, b'+' | b'-' | b'R') {
            return Err(DateTimeError::InvalidCharacter {
                position: 15,
                character: sign as char,
            });
        }

        let two = |at: usize| (bytes[at] - b'0') * 10 + (bytes[at + 1] - b'0');
        // relative periods count elapsed units, so zero month/day is legal
        if sign != b'R' {
            check("month", two(2), 1, 12)?;
            check("day", two(4), 1, 31)?;
        }
        check("hour", two(6), 0, 23)?;
        check("minute", two(8), 0, 59)?;
        check("second", two(10), 0, 59)?;
        check("utc offset", two(13), 0, 48)?;

        Ok(SmppDateTime(value.to_string()))
    }

    /// A time as the peer sent it. Non-conforming values are kept verbatim
    /// so one odd field does not cost the whole PDU; they fail to encode.
    pub fn from_peer(value: &str) -> Self {
        Self::new(value).unwrap_or_else(|_| SmppDateTime(value.to_string()))
    }

    pub fn immediate() -> Self {
        SmppDateTime(String::new())
    }

    pub fn is_immediate(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.0.ends_with('R')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check(field: &'static str, value: u8, min: u8, max: u8) -> Result<(), DateTimeError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DateTimeError::OutOfRange { field, value })
    }
}

impl fmt::Debug for SmppDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_immediate() {
            write!(f, "SmppDateTime(immediate)")
        } else {
            write!(f, "SmppDateTime({})", self.0)
        }
    }
}

impl fmt::Display for SmppDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
