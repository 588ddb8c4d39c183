//! Response codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS response code, including the RFC 2136 update codes and the TSIG
/// codes carried in the TSIG rdata error field (RFC 8945).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCode {
    /// No error.
    NoError,
    /// The query was malformed.
    FormErr,
    /// The server failed internally.
    ServFail,
    /// The name does not exist.
    NXDomain,
    /// The operation is not implemented.
    NotImp,
    /// The server refuses to perform the operation.
    Refused,
    /// A name exists when it should not (RFC 2136).
    YXDomain,
    /// An RRset exists when it should not (RFC 2136).
    YXRRSet,
    /// An RRset that should exist does not (RFC 2136).
    NXRRSet,
    /// The server is not authoritative / signature failure (RFC 8945).
    NotAuth,
    /// A name is outside the zone named in the zone section (RFC 2136).
    NotZone,
    /// TSIG signature failure (TSIG rdata error field).
    BadSig,
    /// TSIG key not recognized (TSIG rdata error field).
    BadKey,
    /// TSIG time outside the allowed window (TSIG rdata error field).
    BadTime,
}

impl ResponseCode {
    /// Returns the full numeric code.
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::NoError => 0,
            Self::FormErr => 1,
            Self::ServFail => 2,
            Self::NXDomain => 3,
            Self::NotImp => 4,
            Self::Refused => 5,
            Self::YXDomain => 6,
            Self::YXRRSet => 7,
            Self::NXRRSet => 8,
            Self::NotAuth => 9,
            Self::NotZone => 10,
            Self::BadSig => 16,
            Self::BadKey => 17,
            Self::BadTime => 18,
        }
    }

    /// Returns the low four bits carried in the message header.
    pub const fn header_rcode(self) -> u8 {
        (self.to_u16() & 0x0f) as u8
    }

    /// Converts from the four header bits.
    pub fn from_header(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoError),
            1 => Some(Self::FormErr),
            2 => Some(Self::ServFail),
            3 => Some(Self::NXDomain),
            4 => Some(Self::NotImp),
            5 => Some(Self::Refused),
            6 => Some(Self::YXDomain),
            7 => Some(Self::YXRRSet),
            8 => Some(Self::NXRRSet),
            9 => Some(Self::NotAuth),
            10 => Some(Self::NotZone),
            _ => None,
        }
    }

    /// Returns true for NOERROR.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Returns the conventional name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::FormErr => "FORMERR",
            Self::ServFail => "SERVFAIL",
            Self::NXDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::YXDomain => "YXDOMAIN",
            Self::YXRRSet => "YXRRSET",
            Self::NXRRSet => "NXRRSET",
            Self::NotAuth => "NOTAUTH",
            Self::NotZone => "NOTZONE",
            Self::BadSig => "BADSIG",
            Self::BadKey => "BADKEY",
            Self::BadTime => "BADTIME",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        Self::NoError
    }
}
