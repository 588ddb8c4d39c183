//! Record types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A record type arx understands.
///
/// The data types are the ones served from zones and accepted in
/// updates; OPT, TSIG, and the query meta-types are needed by the
/// message layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 host address.
    A,
    /// Authoritative name server.
    NS,
    /// Canonical name alias.
    CNAME,
    /// Start of authority.
    SOA,
    /// Text strings.
    TXT,
    /// IPv6 host address.
    AAAA,
    /// Service locator (RFC 2782).
    SRV,
    /// EDNS0 pseudo-record (RFC 6891).
    OPT,
    /// Incremental zone transfer request (RFC 1995).
    IXFR,
    /// Full zone transfer request (RFC 5936).
    AXFR,
    /// All records (QTYPE */ RFC 2136 delete-name).
    ANY,
    /// Transaction signature (RFC 8945).
    TSIG,
}

impl RecordType {
    /// Returns the numeric type.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::SOA => 6,
            Self::TXT => 16,
            Self::AAAA => 28,
            Self::SRV => 33,
            Self::OPT => 41,
            Self::TSIG => 250,
            Self::IXFR => 251,
            Self::AXFR => 252,
            Self::ANY => 255,
        }
    }

    /// Converts from the numeric type.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::A),
            2 => Some(Self::NS),
            5 => Some(Self::CNAME),
            6 => Some(Self::SOA),
            16 => Some(Self::TXT),
            28 => Some(Self::AAAA),
            33 => Some(Self::SRV),
            41 => Some(Self::OPT),
            250 => Some(Self::TSIG),
            251 => Some(Self::IXFR),
            252 => Some(Self::AXFR),
            255 => Some(Self::ANY),
            _ => None,
        }
    }

    /// Returns true for the transfer request meta-types.
    pub const fn is_transfer(self) -> bool {
        matches!(self, Self::AXFR | Self::IXFR)
    }

    /// Returns true for types that never live in a zone.
    pub const fn is_meta(self) -> bool {
        matches!(self, Self::OPT | Self::TSIG | Self::IXFR | Self::AXFR | Self::ANY)
    }

    /// Returns the conventional name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::NS => "NS",
            Self::CNAME => "CNAME",
            Self::SOA => "SOA",
            Self::TXT => "TXT",
            Self::AAAA => "AAAA",
            Self::SRV => "SRV",
            Self::OPT => "OPT",
            Self::TSIG => "TSIG",
            Self::IXFR => "IXFR",
            Self::AXFR => "AXFR",
            Self::ANY => "ANY",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "NS" => Ok(Self::NS),
            "CNAME" => Ok(Self::CNAME),
            "SOA" => Ok(Self::SOA),
            "TXT" => Ok(Self::TXT),
            "AAAA" => Ok(Self::AAAA),
            "SRV" => Ok(Self::SRV),
            "ANY" => Ok(Self::ANY),
            "AXFR" => Ok(Self::AXFR),
            "IXFR" => Ok(Self::IXFR),
            _ => Err(()),
        }
    }
}

/// A type value that may be outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A type arx understands.
    Known(RecordType),
    /// Any other value, preserved verbatim.
    Unknown(u16),
}

impl Type {
    /// Converts from the numeric type.
    pub fn from_u16(value: u16) -> Self {
        RecordType::from_u16(value)
            .map(Self::Known)
            .unwrap_or(Self::Unknown(value))
    }

    /// Returns the numeric type.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Known(t) => t.to_u16(),
            Self::Unknown(v) => v,
        }
    }

    /// Returns the known type, if any.
    pub const fn as_known(self) -> Option<RecordType> {
        match self {
            Self::Known(t) => Some(t),
            Self::Unknown(_) => None,
        }
    }
}

impl From<RecordType> for Type {
    fn from(t: RecordType) -> Self {
        Self::Known(t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(t) => t.fmt(f),
            Self::Unknown(v) => write!(f, "TYPE{v}"),
        }
    }
}
