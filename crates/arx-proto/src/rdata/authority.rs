//! SOA and NS rdata.

use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Start-of-authority rdata (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Soa {
    /// Primary name server.
    pub mname: Name,
    /// Responsible mailbox, encoded as a name.
    pub rname: Name,
    /// Zone serial.
    pub serial: u32,
    /// Secondary refresh interval, seconds.
    pub refresh: u32,
    /// Secondary retry interval, seconds.
    pub retry: u32,
    /// Secondary expiry, seconds.
    pub expire: u32,
    /// Negative-caching TTL, seconds.
    pub minttl: u32,
}

impl Soa {
    /// Creates SOA rdata.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minttl: u32,
    ) -> Self {
        Self {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minttl,
        }
    }

    /// Creates the default SOA for a freshly materialized zone:
    /// `ns.dns.<origin>` as primary, `hostmaster.<origin>` as mailbox,
    /// the current unix time as serial, and the timers
    /// refresh 7200 / retry 1800 / expire 86400 / minttl 30.
    pub fn for_origin(origin: &Name) -> Self {
        let mname = origin
            .prepend_label("dns")
            .and_then(|n| n.prepend_label("ns"))
            .unwrap_or_else(|_| origin.clone());
        let rname = origin
            .prepend_label("hostmaster")
            .unwrap_or_else(|_| origin.clone());
        let serial = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        Self::new(mname, rname, serial, 7200, 1800, 86400, 30)
    }

    /// RFC 1982 serial comparison: true when `a` is newer than `b`.
    pub fn serial_gt(a: u32, b: u32) -> bool {
        let diff = a.wrapping_sub(b);
        diff != 0 && diff < 0x8000_0000
    }

    /// Parses from the message at `offset` (names may be compressed).
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        let parser = NameParser::new(message);
        let (mname, used) = parser.parse_name(offset)?;
        let (rname, used2) = parser.parse_name(offset + used)?;
        let fixed = offset + used + used2;
        if fixed + 20 > message.len() {
            return Err(Error::buffer_too_short(fixed + 20, message.len()));
        }
        let word = |at: usize| u32::from_be_bytes(message[at..at + 4].try_into().unwrap());
        Ok(Self {
            mname,
            rname,
            serial: word(fixed),
            refresh: word(fixed + 4),
            retry: word(fixed + 8),
            expire: word(fixed + 12),
            minttl: word(fixed + 16),
        })
    }

    /// Parses presentation form: `mname rname serial refresh retry
    /// expire minttl`.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        if tokens.len() < 7 {
            return Err(Error::rdata("SOA", "expected 7 fields"));
        }
        let number = |s: &str| {
            s.parse::<u32>()
                .map_err(|e| Error::rdata("SOA", e.to_string()))
        };
        Ok(Self {
            mname: Name::from_str(tokens[0])?,
            rname: Name::from_str(tokens[1])?,
            serial: number(tokens[2])?,
            refresh: number(tokens[3])?,
            retry: number(tokens[4])?,
            expire: number(tokens[5])?,
            minttl: number(tokens[6])?,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.mname.wire_len() + self.rname.wire_len() + 20
    }

    /// Appends the rdata in wire form, uncompressed.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.mname.write_wire(buf);
        self.rname.write_wire(buf);
        buf.extend_from_slice(&self.serial.to_be_bytes());
        buf.extend_from_slice(&self.refresh.to_be_bytes());
        buf.extend_from_slice(&self.retry.to_be_bytes());
        buf.extend_from_slice(&self.expire.to_be_bytes());
        buf.extend_from_slice(&self.minttl.to_be_bytes());
    }
}

impl fmt::Display for Soa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname, self.rname, self.serial, self.refresh, self.retry, self.expire, self.minttl
        )
    }
}

/// Name-server rdata (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ns {
    /// The authoritative server's host name.
    pub nsdname: Name,
}

impl Ns {
    /// Creates NS rdata.
    pub const fn new(nsdname: Name) -> Self {
        Self { nsdname }
    }

    /// Parses from the message at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        let (nsdname, _) = NameParser::new(message).parse_name(offset)?;
        Ok(Self { nsdname })
    }

    /// Parses presentation form.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        let target = tokens
            .first()
            .ok_or_else(|| Error::rdata("NS", "missing target"))?;
        Ok(Self {
            nsdname: Name::from_str(target)?,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.nsdname.wire_len()
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.nsdname.write_wire(buf);
    }
}

impl fmt::Display for Ns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.nsdname.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soa_defaults() {
        let soa = Soa::for_origin(&Name::from_str("example.org.").unwrap());
        assert_eq!(soa.mname.to_string(), "ns.dns.example.org.");
        assert_eq!(soa.rname.to_string(), "hostmaster.example.org.");
        assert_eq!(
            (soa.refresh, soa.retry, soa.expire, soa.minttl),
            (7200, 1800, 86400, 30)
        );
    }

    #[test]
    fn serial_arithmetic() {
        assert!(Soa::serial_gt(2, 1));
        assert!(Soa::serial_gt(0, u32::MAX));
        assert!(!Soa::serial_gt(1, 2));
        assert!(!Soa::serial_gt(5, 5));
    }

    #[test]
    fn presentation_roundtrip() {
        let soa = Soa::new(
            Name::from_str("ns1.example.org.").unwrap(),
            Name::from_str("hostmaster.example.org.").unwrap(),
            1595557027,
            7200,
            1800,
            86400,
            30,
        );
        let text = soa.to_string();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(Soa::parse_presentation(&tokens).unwrap(), soa);
    }
}
