//! The fixed 12-byte message header.

use crate::error::{Error, Result};
use crate::opcode::OpCode;
use crate::rcode::ResponseCode;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the wire header.
pub const HEADER_SIZE: usize = 12;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;

/// A DNS message header.
///
/// ```text
///  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT / ZOCOUNT          |
/// |                    ANCOUNT / PRCOUNT          |
/// |                    NSCOUNT / UPCOUNT          |
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// The RFC 2136 section names (zone, prerequisite, update) map onto the
/// query-form count fields; [`crate::Message`] exposes both views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Transaction id.
    pub id: u16,
    /// Opcode.
    pub opcode: OpCode,
    /// Response code (header bits only).
    pub rcode: ResponseCode,
    /// Raw flag bits (QR/AA/TC/RD/RA).
    pub flags: u16,
    /// Question (zone) count.
    pub qd_count: u16,
    /// Answer (prerequisite) count.
    pub an_count: u16,
    /// Authority (update) count.
    pub ns_count: u16,
    /// Additional count.
    pub ar_count: u16,
}

impl Header {
    /// Creates a query header with the given id.
    pub const fn new(id: u16) -> Self {
        Self {
            id,
            opcode: OpCode::Query,
            rcode: ResponseCode::NoError,
            flags: 0,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// Creates a response header echoing a query's id, opcode, and RD.
    pub fn response_from(query: &Header) -> Self {
        Self {
            id: query.id,
            opcode: query.opcode,
            rcode: ResponseCode::NoError,
            flags: FLAG_QR | (query.flags & FLAG_RD),
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// Returns true for a query (QR clear).
    pub const fn is_query(&self) -> bool {
        self.flags & FLAG_QR == 0
    }

    /// Returns true for a response (QR set).
    pub const fn is_response(&self) -> bool {
        !self.is_query()
    }

    /// Returns the AA bit.
    pub const fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AA != 0
    }

    /// Sets the AA bit.
    pub fn set_authoritative(&mut self, aa: bool) {
        self.set_flag(FLAG_AA, aa);
    }

    /// Returns the TC bit.
    pub const fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    /// Sets the TC bit.
    pub fn set_truncated(&mut self, tc: bool) {
        self.set_flag(FLAG_TC, tc);
    }

    /// Returns the RD bit.
    pub const fn recursion_desired(&self) -> bool {
        self.flags & FLAG_RD != 0
    }

    /// Returns the RA bit.
    pub const fn recursion_available(&self) -> bool {
        self.flags & FLAG_RA != 0
    }

    fn set_flag(&mut self, mask: u16, on: bool) {
        if on {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    /// Parses a header from the start of a message.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::buffer_too_short(HEADER_SIZE, data.len()));
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let bits = u16::from_be_bytes([data[2], data[3]]);

        let opcode = OpCode::from_u8(((bits >> 11) & 0x0f) as u8).unwrap_or(OpCode::Query);
        let rcode = ResponseCode::from_header((bits & 0x0f) as u8).unwrap_or(ResponseCode::NoError);

        Ok(Self {
            id,
            opcode,
            rcode,
            flags: bits & (FLAG_QR | FLAG_AA | FLAG_TC | FLAG_RD | FLAG_RA),
            qd_count: u16::from_be_bytes([data[4], data[5]]),
            an_count: u16::from_be_bytes([data[6], data[7]]),
            ns_count: u16::from_be_bytes([data[8], data[9]]),
            ar_count: u16::from_be_bytes([data[10], data[11]]),
        })
    }

    /// Appends the header in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let bits = self.flags
            | ((self.opcode.to_u8() as u16) << 11)
            | (self.rcode.header_rcode() as u16);

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&bits.to_be_bytes());
        buf.extend_from_slice(&self.qd_count.to_be_bytes());
        buf.extend_from_slice(&self.an_count.to_be_bytes());
        buf.extend_from_slice(&self.ns_count.to_be_bytes());
        buf.extend_from_slice(&self.ar_count.to_be_bytes());
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "opcode: {}, status: {}, id: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            self.opcode, self.rcode, self.id, self.qd_count, self.an_count, self.ns_count, self.ar_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut header = Header::new(0xbeef);
        header.opcode = OpCode::Update;
        header.set_authoritative(true);
        header.qd_count = 1;
        header.ns_count = 3;

        let mut buf = BytesMut::new();
        header.write_to(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let parsed = Header::parse(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn response_echoes_id_and_rd() {
        let mut query = Header::new(7);
        query.flags |= FLAG_RD;
        let response = Header::response_from(&query);
        assert!(response.is_response());
        assert_eq!(response.id, 7);
        assert!(response.recursion_desired());
    }
}
