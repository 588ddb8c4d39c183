//! A and AAAA rdata.

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// IPv4 host address (RFC 1035).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct A {
    /// The address.
    pub addr: Ipv4Addr,
}

impl A {
    /// Creates A rdata.
    pub const fn new(addr: Ipv4Addr) -> Self {
        Self { addr }
    }

    /// Parses from exactly four rdata bytes.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let octets: [u8; 4] = rdata
            .try_into()
            .map_err(|_| Error::rdata("A", format!("expected 4 bytes, got {}", rdata.len())))?;
        Ok(Self::new(Ipv4Addr::from(octets)))
    }

    /// Parses presentation form.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        let addr = tokens
            .first()
            .ok_or_else(|| Error::rdata("A", "missing address"))?
            .parse::<Ipv4Addr>()
            .map_err(|e| Error::rdata("A", e.to_string()))?;
        Ok(Self::new(addr))
    }

    /// Returns the wire length.
    pub const fn wire_len(&self) -> usize {
        4
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.addr.octets());
    }
}

impl fmt::Display for A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

/// IPv6 host address (RFC 3596).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aaaa {
    /// The address.
    pub addr: Ipv6Addr,
}

impl Aaaa {
    /// Creates AAAA rdata.
    pub const fn new(addr: Ipv6Addr) -> Self {
        Self { addr }
    }

    /// Parses from exactly sixteen rdata bytes.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let octets: [u8; 16] = rdata
            .try_into()
            .map_err(|_| Error::rdata("AAAA", format!("expected 16 bytes, got {}", rdata.len())))?;
        Ok(Self::new(Ipv6Addr::from(octets)))
    }

    /// Parses presentation form.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        let addr = tokens
            .first()
            .ok_or_else(|| Error::rdata("AAAA", "missing address"))?
            .parse::<Ipv6Addr>()
            .map_err(|e| Error::rdata("AAAA", e.to_string()))?;
        Ok(Self::new(addr))
    }

    /// Returns the wire length.
    pub const fn wire_len(&self) -> usize {
        16
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.addr.octets());
    }
}

impl fmt::Display for Aaaa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}
