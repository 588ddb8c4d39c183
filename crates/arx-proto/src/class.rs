//! Record classes.
//!
//! arx is authoritative for IN only, but UPDATE messages overload the
//! class field to select the operation (RFC 2136 section 2.5), so NONE
//! and ANY must round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A known DNS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordClass {
    /// Internet.
    IN,
    /// Chaos.
    CH,
    /// Hesiod.
    HS,
    /// QCLASS NONE (RFC 2136 delete-exact-RR).
    NONE,
    /// QCLASS ANY (RFC 2136 delete-rrset / delete-name; TSIG class).
    ANY,
}

impl RecordClass {
    /// Returns the numeric class.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::IN => 1,
            Self::CH => 3,
            Self::HS => 4,
            Self::NONE => 254,
            Self::ANY => 255,
        }
    }

    /// Converts from the numeric class.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::IN),
            3 => Some(Self::CH),
            4 => Some(Self::HS),
            254 => Some(Self::NONE),
            255 => Some(Self::ANY),
            _ => None,
        }
    }

    /// Returns the conventional name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IN => "IN",
            Self::CH => "CH",
            Self::HS => "HS",
            Self::NONE => "NONE",
            Self::ANY => "ANY",
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for RecordClass {
    fn default() -> Self {
        Self::IN
    }
}

/// A class value that may be outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    /// A class arx understands.
    Known(RecordClass),
    /// Any other value, preserved verbatim.
    Unknown(u16),
}

impl Class {
    /// Converts from the numeric class.
    pub fn from_u16(value: u16) -> Self {
        RecordClass::from_u16(value)
            .map(Self::Known)
            .unwrap_or(Self::Unknown(value))
    }

    /// Returns the numeric class.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Known(c) => c.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Returns the known class, if any.
    pub const fn as_known(self) -> Option<RecordClass> {
        match self {
            Self::Known(c) => Some(c),
            Self::Unknown(_) => None,
        }
    }
}

impl From<RecordClass> for Class {
    fn from(c: RecordClass) -> Self {
        Self::Known(c)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(c) => c.fmt(f),
            Self::Unknown(v) => write!(f, "CLASS{v}"),
        }
    }
}

impl Default for Class {
    fn default() -> Self {
        Self::Known(RecordClass::IN)
    }
}
