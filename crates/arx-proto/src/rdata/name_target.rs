//! CNAME rdata.

use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical-name alias rdata (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cname {
    /// The alias target.
    pub target: Name,
}

impl Cname {
    /// Creates CNAME rdata.
    pub const fn new(target: Name) -> Self {
        Self { target }
    }

    /// Parses from the message at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        let (target, _) = NameParser::new(message).parse_name(offset)?;
        Ok(Self { target })
    }

    /// Parses presentation form.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        let target = tokens
            .first()
            .ok_or_else(|| Error::rdata("CNAME", "missing target"))?;
        Ok(Self {
            target: Name::from_str(target)?,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.target.wire_len()
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.target.write_wire(buf);
    }
}

impl fmt::Display for Cname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target.fmt(f)
    }
}
