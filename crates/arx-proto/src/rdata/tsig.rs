//! TSIG rdata (RFC 8945 section 4.2).

use crate::class::RecordClass;
use crate::error::{Error, Result};
use crate::name::{Name, NameParser};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction-signature rdata.
///
/// ```text
/// Algorithm Name   domain-name
/// Time Signed      u48, seconds since the epoch
/// Fudge            u16
/// MAC Size / MAC   u16 + octets
/// Original ID      u16
/// Error            u16
/// Other Len/Data   u16 + octets (BADTIME only)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tsig {
    /// Algorithm, in domain-name syntax (e.g. `hmac-sha256.`).
    pub algorithm: Name,
    /// Seconds since the epoch when the message was signed.
    pub time_signed: u64,
    /// Permitted clock skew, seconds.
    pub fudge: u16,
    /// The message authentication code.
    pub mac: Vec<u8>,
    /// The id of the message before the signer rewrote it.
    pub original_id: u16,
    /// TSIG-level error (BADSIG/BADKEY/BADTIME).
    pub error: u16,
    /// Other data; server clock time for BADTIME.
    pub other: Vec<u8>,
}

impl Tsig {
    /// Parses from the message at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<Self> {
        let (algorithm, used) = NameParser::new(message).parse_name(offset)?;
        let mut pos = offset + used;

        let need = |pos: usize, n: usize| {
            if pos + n > message.len() {
                Err(Error::buffer_too_short(pos + n, message.len()))
            } else {
                Ok(())
            }
        };

        need(pos, 10)?;
        let time_signed = ((u16::from_be_bytes([message[pos], message[pos + 1]]) as u64) << 32)
            | u32::from_be_bytes(message[pos + 2..pos + 6].try_into().unwrap()) as u64;
        let fudge = u16::from_be_bytes([message[pos + 6], message[pos + 7]]);
        let mac_size = u16::from_be_bytes([message[pos + 8], message[pos + 9]]) as usize;
        pos += 10;

        need(pos, mac_size)?;
        let mac = message[pos..pos + mac_size].to_vec();
        pos += mac_size;

        need(pos, 6)?;
        let original_id = u16::from_be_bytes([message[pos], message[pos + 1]]);
        let error = u16::from_be_bytes([message[pos + 2], message[pos + 3]]);
        let other_len = u16::from_be_bytes([message[pos + 4], message[pos + 5]]) as usize;
        pos += 6;

        need(pos, other_len)?;
        let other = message[pos..pos + other_len].to_vec();

        Ok(Self {
            algorithm,
            time_signed,
            fudge,
            mac,
            original_id,
            error,
            other,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.algorithm.wire_len() + 10 + self.mac.len() + 6 + self.other.len()
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.algorithm.write_wire(buf);
        self.write_time(buf);
        buf.extend_from_slice(&(self.mac.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.mac);
        buf.extend_from_slice(&self.original_id.to_be_bytes());
        buf.extend_from_slice(&self.error.to_be_bytes());
        buf.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.other);
    }

    /// Appends the TSIG variables covered by the MAC: key name (class
    /// ANY, TTL 0), algorithm, time, fudge, error, other. Names go in
    /// canonical lowercase form.
    pub fn write_mac_variables(&self, buf: &mut BytesMut, key_name: &Name) {
        key_name.write_canonical(buf);
        buf.extend_from_slice(&RecordClass::ANY.to_u16().to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        self.algorithm.write_canonical(buf);
        self.write_time(buf);
        buf.extend_from_slice(&self.error.to_be_bytes());
        buf.extend_from_slice(&(self.other.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.other);
    }

    fn write_time(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&((self.time_signed >> 32) as u16).to_be_bytes());
        buf.extend_from_slice(&(self.time_signed as u32).to_be_bytes());
        buf.extend_from_slice(&self.fudge.to_be_bytes());
    }
}

impl fmt::Display for Tsig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.algorithm,
            self.time_signed,
            self.fudge,
            self.mac.len(),
            self.error
        )
    }
}
