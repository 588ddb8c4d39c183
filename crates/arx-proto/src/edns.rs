//! EDNS0 (RFC 6891).
//!
//! arx only needs the OPT pseudo-record for payload-size negotiation:
//! queries advertising a larger UDP payload get responses up to that
//! size, and arx's own responses advertise [`crate::EDNS_UDP_SIZE`].
//! Options within the OPT rdata are preserved opaquely.

use crate::error::Result;
use crate::EDNS_UDP_SIZE;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed OPT pseudo-record state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edns {
    /// Requestor's UDP payload size (the OPT class field).
    udp_size: u16,
    /// EDNS version (must be 0).
    version: u8,
    /// DO bit and reserved flags (the low 16 bits of the OPT TTL).
    flags: u16,
    /// Raw option bytes, preserved but not interpreted.
    options: Vec<u8>,
}

impl Edns {
    /// Creates the OPT state arx attaches to its own responses.
    pub fn new() -> Self {
        Self {
            udp_size: EDNS_UDP_SIZE,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    /// Returns the advertised UDP payload size, clamped to at least 512.
    pub fn udp_size(&self) -> u16 {
        self.udp_size.max(512)
    }

    /// Reconstructs EDNS state from a parsed OPT record's class, ttl,
    /// and rdata.
    pub fn from_opt(class: u16, ttl: u32, rdata: &[u8]) -> Result<Self> {
        Ok(Self {
            udp_size: class,
            version: ((ttl >> 16) & 0xff) as u8,
            flags: (ttl & 0xffff) as u16,
            options: rdata.to_vec(),
        })
    }

    /// Returns the wire length of the OPT record.
    pub fn wire_len(&self) -> usize {
        // root name + type + class + ttl + rdlength + options
        1 + 2 + 2 + 4 + 2 + self.options.len()
    }

    /// Appends the OPT record in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[0]); // root owner
        buf.extend_from_slice(&crate::RecordType::OPT.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.udp_size.to_be_bytes());
        let ttl = ((self.version as u32) << 16) | self.flags as u32;
        buf.extend_from_slice(&ttl.to_be_bytes());
        buf.extend_from_slice(&(self.options.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.options);
    }
}

impl Default for Edns {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Edns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EDNS: version {}; udp: {}", self.version, self.udp_size)
    }
}
