//! SRV rdata.

use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Service-locator rdata (RFC 2782).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Srv {
    /// Lower values are tried first.
    pub priority: u16,
    /// Relative weight among equal priorities.
    pub weight: u16,
    /// Service port.
    pub port: u16,
    /// Target host name.
    pub target: Name,
}

impl Srv {
    /// Creates SRV rdata.
    pub const fn new(priority: u16, weight: u16, port: u16, target: Name) -> Self {
        Self {
            priority,
            weight,
            port,
            target,
        }
    }

    /// Parses from the message at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        if offset + 6 > message.len() {
            return Err(Error::buffer_too_short(offset + 6, message.len()));
        }
        let half = |at: usize| u16::from_be_bytes([message[at], message[at + 1]]);
        let (target, _) = NameParser::new(message).parse_name(offset + 6)?;
        Ok(Self {
            priority: half(offset),
            weight: half(offset + 2),
            port: half(offset + 4),
            target,
        })
    }

    /// Parses presentation form: `priority weight port target`.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        if tokens.len() < 4 {
            return Err(Error::rdata("SRV", "expected 4 fields"));
        }
        let half = |s: &str| {
            s.parse::<u16>()
                .map_err(|e| Error::rdata("SRV", e.to_string()))
        };
        Ok(Self {
            priority: half(tokens[0])?,
            weight: half(tokens[1])?,
            port: half(tokens[2])?,
            target: Name::from_str(tokens[3])?,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        6 + self.target.wire_len()
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.priority.to_be_bytes());
        buf.extend_from_slice(&self.weight.to_be_bytes());
        buf.extend_from_slice(&self.port.to_be_bytes());
        self.target.write_wire(buf);
    }
}

impl fmt::Display for Srv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}
