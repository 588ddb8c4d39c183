//! Message opcodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS message opcode (RFC 1035, RFC 1996, RFC 2136).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// Standard query.
    Query,
    /// Server status request (obsolete, recognized only).
    Status,
    /// Zone change notification (RFC 1996).
    Notify,
    /// Dynamic update (RFC 2136).
    Update,
}

impl OpCode {
    /// Returns the numeric opcode.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Query => 0,
            Self::Status => 2,
            Self::Notify => 4,
            Self::Update => 5,
        }
    }

    /// Converts from the numeric opcode.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Query),
            2 => Some(Self::Status),
            4 => Some(Self::Notify),
            5 => Some(Self::Update),
            _ => None,
        }
    }

    /// Returns the conventional name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Status => "STATUS",
            Self::Notify => "NOTIFY",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for OpCode {
    fn default() -> Self {
        Self::Query
    }
}
