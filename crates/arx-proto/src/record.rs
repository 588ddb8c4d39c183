//! Resource records, in wire and presentation form.

use crate::class::{Class, RecordClass};
use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use crate::rdata::{Aaaa, Cname, Ns, RData, Soa, Srv, Txt, A};
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRecord {
    name: Name,
    rtype: Type,
    rclass: Class,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a record from parts.
    pub fn new(name: Name, rtype: Type, rclass: Class, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Creates an IN-class record of a known type.
    pub fn new_in(name: Name, rtype: RecordType, ttl: u32, rdata: RData) -> Self {
        Self::new(
            name,
            Type::Known(rtype),
            Class::Known(RecordClass::IN),
            ttl,
            rdata,
        )
    }

    /// Creates an A record.
    pub fn a(name: Name, ttl: u32, addr: std::net::Ipv4Addr) -> Self {
        Self::new_in(name, RecordType::A, ttl, RData::A(A::new(addr)))
    }

    /// Creates an AAAA record.
    pub fn aaaa(name: Name, ttl: u32, addr: std::net::Ipv6Addr) -> Self {
        Self::new_in(name, RecordType::AAAA, ttl, RData::Aaaa(Aaaa::new(addr)))
    }

    /// Creates a CNAME record.
    pub fn cname(name: Name, ttl: u32, target: Name) -> Self {
        Self::new_in(name, RecordType::CNAME, ttl, RData::Cname(Cname::new(target)))
    }

    /// Creates an NS record.
    pub fn ns(name: Name, ttl: u32, nsdname: Name) -> Self {
        Self::new_in(name, RecordType::NS, ttl, RData::Ns(Ns::new(nsdname)))
    }

    /// Creates an SOA record.
    pub fn soa(name: Name, ttl: u32, soa: Soa) -> Self {
        Self::new_in(name, RecordType::SOA, ttl, RData::Soa(soa))
    }

    /// Creates a TXT record.
    pub fn txt(name: Name, ttl: u32, text: impl Into<Vec<u8>>) -> Self {
        Self::new_in(name, RecordType::TXT, ttl, RData::Txt(Txt::from_text(text)))
    }

    /// Creates an SRV record.
    pub fn srv(name: Name, ttl: u32, srv: Srv) -> Self {
        Self::new_in(name, RecordType::SRV, ttl, RData::Srv(srv))
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the type.
    #[inline]
    pub fn rtype(&self) -> Type {
        self.rtype
    }

    /// Returns the known type, if any.
    #[inline]
    pub fn record_type(&self) -> Option<RecordType> {
        self.rtype.as_known()
    }

    /// Returns the class.
    #[inline]
    pub fn rclass(&self) -> Class {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub const fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the rdata.
    #[inline]
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Returns a copy with a different TTL.
    pub fn with_ttl(&self, ttl: u32) -> Self {
        let mut record = self.clone();
        record.ttl = ttl;
        record
    }

    /// Parses a record at `offset`, returning it and the bytes used.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, name_len) = NameParser::new(message).parse_name(offset)?;
        let fixed = offset + name_len;
        if fixed + 10 > message.len() {
            return Err(Error::buffer_too_short(fixed + 10, message.len()));
        }

        let rtype = Type::from_u16(u16::from_be_bytes([message[fixed], message[fixed + 1]]));
        let rclass = Class::from_u16(u16::from_be_bytes([message[fixed + 2], message[fixed + 3]]));
        let ttl = u32::from_be_bytes(message[fixed + 4..fixed + 8].try_into().unwrap());
        let rdlength = u16::from_be_bytes([message[fixed + 8], message[fixed + 9]]);

        let rdata = RData::parse(rtype, message, fixed + 10, rdlength)?;

        Ok((
            Self {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            name_len + 10 + rdlength as usize,
        ))
    }

    /// Returns the wire length (names uncompressed).
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 10 + self.rdata.wire_len()
    }

    /// Appends the record in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.extend_from_slice(&self.rtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.rclass.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());
        buf.extend_from_slice(&(self.rdata.wire_len() as u16).to_be_bytes());
        self.rdata.write_to(buf);
    }

    /// Converts to wire bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.to_vec()
    }
}

impl fmt::Display for ResourceRecord {
    /// Presentation form: `name ttl class type rdata`, tab separated.
    /// This is the format persisted in the change log; [`FromStr`] is
    /// its inverse.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

impl FromStr for ResourceRecord {
    type Err = Error;

    /// Parses one presentation line: `name [ttl] [class] type rdata`.
    /// The owner name must be fully qualified; no origin is applied.
    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(Error::presentation("record line too short"));
        }

        let name = Name::from_str(tokens[0])?;
        let mut pos = 1;

        let ttl = match tokens.get(pos).and_then(|t| t.parse::<u32>().ok()) {
            Some(ttl) => {
                pos += 1;
                ttl
            }
            None => 3600,
        };

        let rclass = match tokens.get(pos).map(|t| t.to_ascii_uppercase()) {
            Some(ref c) if matches!(c.as_str(), "IN" | "CH" | "HS" | "NONE" | "ANY") => {
                pos += 1;
                match c.as_str() {
                    "IN" => Class::Known(RecordClass::IN),
                    "CH" => Class::Known(RecordClass::CH),
                    "HS" => Class::Known(RecordClass::HS),
                    "NONE" => Class::Known(RecordClass::NONE),
                    _ => Class::Known(RecordClass::ANY),
                }
            }
            _ => Class::Known(RecordClass::IN),
        };

        let type_token = tokens
            .get(pos)
            .ok_or_else(|| Error::presentation("missing record type"))?;
        let rtype = RecordType::from_str(type_token)
            .map_err(|()| Error::presentation(format!("unknown record type {type_token}")))?;
        pos += 1;

        let rdata = RData::parse_presentation(rtype, &tokens[pos..])?;

        Ok(Self {
            name,
            rtype: Type::Known(rtype),
            rclass,
            ttl,
            rdata,
        })
    }
}

/// Cursor over a record section of a message.
#[derive(Debug)]
pub struct RecordParser<'a> {
    message: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> RecordParser<'a> {
    /// Creates a parser for `count` records starting at `offset`.
    pub const fn new(message: &'a [u8], offset: usize, count: u16) -> Self {
        Self {
            message,
            offset,
            remaining: count,
        }
    }

    /// Returns the offset past the last parsed record.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Parses the next record.
    pub fn next(&mut self) -> Result<Option<ResourceRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let (record, used) = ResourceRecord::parse(self.message, self.offset)?;
        self.offset += used;
        self.remaining -= 1;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn wire_roundtrip() {
        let rr = ResourceRecord::a(
            Name::from_str("www.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(192, 0, 2, 10),
        );
        let wire = rr.to_wire();
        let (parsed, used) = ResourceRecord::parse(&wire, 0).unwrap();
        assert_eq!(used, wire.len());
        assert_eq!(parsed, rr);
    }

    #[test]
    fn presentation_roundtrip_all_types() {
        let name = Name::from_str("host.example.org.").unwrap();
        let records = vec![
            ResourceRecord::a(name.clone(), 300, Ipv4Addr::LOCALHOST),
            ResourceRecord::aaaa(name.clone(), 300, Ipv6Addr::LOCALHOST),
            ResourceRecord::cname(name.clone(), 60, Name::from_str("example.org.").unwrap()),
            ResourceRecord::ns(name.clone(), 60, Name::from_str("ns1.example.org.").unwrap()),
            ResourceRecord::txt(name.clone(), 120, "v=spf1 -all"),
            ResourceRecord::srv(
                name.clone(),
                120,
                Srv::new(10, 5, 5060, Name::from_str("sip.example.org.").unwrap()),
            ),
            ResourceRecord::soa(
                name.clone(),
                30,
                Soa::new(
                    Name::from_str("ns.dns.example.org.").unwrap(),
                    Name::from_str("hostmaster.example.org.").unwrap(),
                    42,
                    7200,
                    1800,
                    86400,
                    30,
                ),
            ),
        ];
        for rr in records {
            let line = rr.to_string();
            let parsed: ResourceRecord = line.parse().unwrap();
            assert_eq!(parsed, rr, "line {line:?}");
        }
    }

    #[test]
    fn presentation_without_ttl_or_class() {
        let rr: ResourceRecord = "new.example.org. A 127.0.0.1".parse().unwrap();
        assert_eq!(rr.ttl(), 3600);
        assert_eq!(rr.record_type(), Some(RecordType::A));
    }

    #[test]
    fn presentation_none_class() {
        let rr: ResourceRecord = "gone.example.org. 0 NONE A 10.0.0.1".parse().unwrap();
        assert_eq!(rr.rclass(), Class::Known(RecordClass::NONE));
    }
}
