//! Typed rdata.

use crate::error::{Error, Result};
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod address;
pub mod authority;
pub mod name_target;
pub mod service;
pub mod text;
pub mod tsig;

pub use address::{Aaaa, A};
pub use authority::{Ns, Soa};
pub use name_target::Cname;
pub use service::Srv;
pub use text::Txt;
pub use tsig::Tsig;

/// The rdata of a resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RData {
    /// IPv4 address.
    A(A),
    /// IPv6 address.
    Aaaa(Aaaa),
    /// Alias.
    Cname(Cname),
    /// Name server.
    Ns(Ns),
    /// Start of authority.
    Soa(Soa),
    /// Text.
    Txt(Txt),
    /// Service locator.
    Srv(Srv),
    /// Transaction signature.
    Tsig(Tsig),
    /// Rdata of a type arx does not interpret, kept verbatim.
    Unknown {
        /// The numeric record type.
        rtype: u16,
        /// The raw rdata bytes.
        bytes: Vec<u8>,
    },
    /// Empty rdata, used by RFC 2136 delete operations where only the
    /// header of the update RR is meaningful.
    Empty(
        /// The record type the empty rdata stands in for.
        u16,
    ),
}

impl RData {
    /// Parses rdata of `rtype` from the message.
    ///
    /// The full message is required because NS/CNAME/SOA/SRV rdata may
    /// contain compressed names.
    pub fn parse(rtype: Type, message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let rdlength = rdlength as usize;
        if offset + rdlength > message.len() {
            return Err(Error::buffer_too_short(offset + rdlength, message.len()));
        }
        if rdlength == 0 {
            return Ok(Self::Empty(rtype.to_u16()));
        }
        let slice = &message[offset..offset + rdlength];
        match rtype.as_known() {
            Some(RecordType::A) => A::parse(slice).map(Self::A),
            Some(RecordType::AAAA) => Aaaa::parse(slice).map(Self::Aaaa),
            Some(RecordType::CNAME) => Cname::parse(message, offset).map(Self::Cname),
            Some(RecordType::NS) => Ns::parse(message, offset).map(Self::Ns),
            Some(RecordType::SOA) => Soa::parse(message, offset).map(Self::Soa),
            Some(RecordType::TXT) => Txt::parse(slice).map(Self::Txt),
            Some(RecordType::SRV) => Srv::parse(message, offset).map(Self::Srv),
            Some(RecordType::TSIG) => Tsig::parse(message, offset).map(Self::Tsig),
            _ => Ok(Self::Unknown {
                rtype: rtype.to_u16(),
                bytes: slice.to_vec(),
            }),
        }
    }

    /// Parses presentation-format rdata for `rtype`.
    pub fn parse_presentation(rtype: RecordType, tokens: &[&str]) -> Result<Self> {
        match rtype {
            RecordType::A => A::parse_presentation(tokens).map(Self::A),
            RecordType::AAAA => Aaaa::parse_presentation(tokens).map(Self::Aaaa),
            RecordType::CNAME => Cname::parse_presentation(tokens).map(Self::Cname),
            RecordType::NS => Ns::parse_presentation(tokens).map(Self::Ns),
            RecordType::SOA => Soa::parse_presentation(tokens).map(Self::Soa),
            RecordType::TXT => Txt::parse_presentation(tokens).map(Self::Txt),
            RecordType::SRV => Srv::parse_presentation(tokens).map(Self::Srv),
            other => Err(Error::presentation(format!(
                "no presentation parser for {other}"
            ))),
        }
    }

    /// Returns the record type this rdata belongs to.
    pub fn rtype(&self) -> Type {
        match self {
            Self::A(_) => Type::Known(RecordType::A),
            Self::Aaaa(_) => Type::Known(RecordType::AAAA),
            Self::Cname(_) => Type::Known(RecordType::CNAME),
            Self::Ns(_) => Type::Known(RecordType::NS),
            Self::Soa(_) => Type::Known(RecordType::SOA),
            Self::Txt(_) => Type::Known(RecordType::TXT),
            Self::Srv(_) => Type::Known(RecordType::SRV),
            Self::Tsig(_) => Type::Known(RecordType::TSIG),
            Self::Unknown { rtype, .. } | Self::Empty(rtype) => Type::from_u16(*rtype),
        }
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        match self {
            Self::A(r) => r.wire_len(),
            Self::Aaaa(r) => r.wire_len(),
            Self::Cname(r) => r.wire_len(),
            Self::Ns(r) => r.wire_len(),
            Self::Soa(r) => r.wire_len(),
            Self::Txt(r) => r.wire_len(),
            Self::Srv(r) => r.wire_len(),
            Self::Tsig(r) => r.wire_len(),
            Self::Unknown { bytes, .. } => bytes.len(),
            Self::Empty(_) => 0,
        }
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::A(r) => r.write_to(buf),
            Self::Aaaa(r) => r.write_to(buf),
            Self::Cname(r) => r.write_to(buf),
            Self::Ns(r) => r.write_to(buf),
            Self::Soa(r) => r.write_to(buf),
            Self::Txt(r) => r.write_to(buf),
            Self::Srv(r) => r.write_to(buf),
            Self::Tsig(r) => r.write_to(buf),
            Self::Unknown { bytes, .. } => buf.extend_from_slice(bytes),
            Self::Empty(_) => {}
        }
    }

    /// Returns the SOA fields, if this is SOA rdata.
    pub fn as_soa(&self) -> Option<&Soa> {
        match self {
            Self::Soa(soa) => Some(soa),
            _ => None,
        }
    }

    /// Returns the CNAME target, if this is CNAME rdata.
    pub fn as_cname(&self) -> Option<&crate::Name> {
        match self {
            Self::Cname(c) => Some(&c.target),
            _ => None,
        }
    }

    /// Returns the TSIG fields, if this is TSIG rdata.
    pub fn as_tsig(&self) -> Option<&Tsig> {
        match self {
            Self::Tsig(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(r) => r.fmt(f),
            Self::Aaaa(r) => r.fmt(f),
            Self::Cname(r) => r.fmt(f),
            Self::Ns(r) => r.fmt(f),
            Self::Soa(r) => r.fmt(f),
            Self::Txt(r) => r.fmt(f),
            Self::Srv(r) => r.fmt(f),
            Self::Tsig(r) => r.fmt(f),
            // RFC 3597 generic encoding.
            Self::Unknown { bytes, .. } => {
                write!(f, "\\# {}", bytes.len())?;
                if !bytes.is_empty() {
                    f.write_str(" ")?;
                    for byte in bytes {
                        write!(f, "{byte:02x}")?;
                    }
                }
                Ok(())
            }
            Self::Empty(_) => write!(f, "\\# 0"),
        }
    }
}
