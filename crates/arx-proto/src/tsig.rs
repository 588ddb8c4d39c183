//! TSIG transaction signatures (RFC 8945).
//!
//! The MAC covers the wire form of a message: an optional
//! length-prefixed request MAC, the message bytes with the original id
//! restored and the TSIG record excluded from ARCOUNT, and the TSIG
//! variables. Response signing chains the request MAC; AXFR envelopes
//! chain the previous envelope's MAC.

use crate::class::Class;
use crate::error::TsigError;
use crate::header::HEADER_SIZE;
use crate::message::{tsig_boundary, Message};
use crate::name::Name;
use crate::rdata::{RData, Tsig};
use crate::record::ResourceRecord;
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use data_encoding::BASE64;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use std::str::FromStr;

/// Default permitted clock skew, seconds (RFC 8945 section 10).
pub const DEFAULT_FUDGE: u16 = 300;

/// Supported HMAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsigAlgorithm {
    /// hmac-sha256 (required by the RFC).
    HmacSha256,
    /// hmac-sha512.
    HmacSha512,
}

impl TsigAlgorithm {
    /// Returns the algorithm's domain-name form.
    pub fn to_name(self) -> Name {
        let text = match self {
            Self::HmacSha256 => "hmac-sha256.",
            Self::HmacSha512 => "hmac-sha512.",
        };
        Name::from_str(text).unwrap_or_default()
    }

    /// Looks up an algorithm by its domain-name form.
    pub fn from_name(name: &Name) -> Option<Self> {
        match name.to_string().to_ascii_lowercase().as_str() {
            "hmac-sha256." => Some(Self::HmacSha256),
            "hmac-sha512." => Some(Self::HmacSha512),
            _ => None,
        }
    }

    fn compute(self, secret: &[u8], data: &[u8]) -> Result<Vec<u8>, TsigError> {
        match self {
            Self::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                    .map_err(|e| TsigError::BadSecret(e.to_string()))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            Self::HmacSha512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret)
                    .map_err(|e| TsigError::BadSecret(e.to_string()))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }

    fn verify(self, secret: &[u8], data: &[u8], tag: &[u8]) -> Result<bool, TsigError> {
        // hmac's verify_slice is constant time.
        match self {
            Self::HmacSha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                    .map_err(|e| TsigError::BadSecret(e.to_string()))?;
                mac.update(data);
                Ok(mac.verify_slice(tag).is_ok())
            }
            Self::HmacSha512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret)
                    .map_err(|e| TsigError::BadSecret(e.to_string()))?;
                mac.update(data);
                Ok(mac.verify_slice(tag).is_ok())
            }
        }
    }
}

/// A shared TSIG key.
#[derive(Debug, Clone)]
pub struct TsigKey {
    /// Key name, matched against the TSIG record's owner.
    pub name: Name,
    /// MAC algorithm.
    pub algorithm: TsigAlgorithm,
    secret: Vec<u8>,
}

impl TsigKey {
    /// Creates a key from raw secret bytes.
    pub fn new(name: Name, algorithm: TsigAlgorithm, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            algorithm,
            secret: secret.into(),
        }
    }

    /// Creates a key from a base64 secret, the form keys are
    /// distributed in.
    pub fn from_base64(
        name: Name,
        algorithm: TsigAlgorithm,
        secret: &str,
    ) -> Result<Self, TsigError> {
        let secret = BASE64
            .decode(secret.as_bytes())
            .map_err(|e| TsigError::BadSecret(e.to_string()))?;
        Ok(Self::new(name, algorithm, secret))
    }
}

/// Outcome of a successful verification, carried forward for response
/// signing and envelope chaining.
#[derive(Debug, Clone)]
pub struct VerifiedTsig {
    /// The key name from the message.
    pub key_name: Name,
    /// The request MAC, chained into the response MAC.
    pub mac: Vec<u8>,
    /// The original message id.
    pub original_id: u16,
}

/// Verifies a signed message against `key`.
///
/// `wire` must be the untouched bytes as received; `prior_mac` is the
/// previous MAC when verifying a chained message. `now` is seconds
/// since the epoch.
pub fn verify_message(
    wire: &[u8],
    key: &TsigKey,
    prior_mac: Option<&[u8]>,
    now: u64,
) -> Result<VerifiedTsig, TsigError> {
    let (tsig_start, tsig_rr) = tsig_boundary(wire)
        .map_err(|_| TsigError::Unsigned)?
        .ok_or(TsigError::Unsigned)?;
    let tsig = tsig_rr.rdata().as_tsig().ok_or(TsigError::Unsigned)?;

    if tsig_rr.name() != &key.name {
        return Err(TsigError::UnknownKey(tsig_rr.name().to_string()));
    }
    match TsigAlgorithm::from_name(&tsig.algorithm) {
        Some(algorithm) if algorithm == key.algorithm => {}
        _ => return Err(TsigError::UnsupportedAlgorithm(tsig.algorithm.to_string())),
    }

    let tbs = message_tbs(wire, tsig_start, tsig, tsig_rr.name(), prior_mac);
    if !key.algorithm.verify(&key.secret, &tbs, &tsig.mac)? {
        return Err(TsigError::BadMac(key.name.to_string()));
    }

    // MAC first, then time: a forger must not learn the clock check
    // outcome.
    let skew = now.abs_diff(tsig.time_signed);
    if skew > tsig.fudge as u64 {
        return Err(TsigError::BadTime {
            time: tsig.time_signed,
            now,
        });
    }

    Ok(VerifiedTsig {
        key_name: tsig_rr.name().clone(),
        mac: tsig.mac.clone(),
        original_id: tsig.original_id,
    })
}

/// Signs `message` with `key`, attaching the TSIG record.
///
/// `prior_mac` is the request MAC when signing a response, or the
/// previous envelope's MAC when signing an AXFR stream. Returns the new
/// MAC for further chaining.
pub fn sign_message(
    message: &mut Message,
    key: &TsigKey,
    prior_mac: Option<&[u8]>,
    now: u64,
) -> Result<Vec<u8>, TsigError> {
    message.set_tsig(None);
    let wire = message.to_wire();

    let pre_tsig = Tsig {
        algorithm: key.algorithm.to_name(),
        time_signed: now,
        fudge: DEFAULT_FUDGE,
        mac: Vec::new(),
        original_id: message.id(),
        error: 0,
        other: Vec::new(),
    };

    let mut tbs = BytesMut::with_capacity(wire.len() + 128);
    if let Some(prior) = prior_mac {
        tbs.extend_from_slice(&(prior.len() as u16).to_be_bytes());
        tbs.extend_from_slice(prior);
    }
    tbs.extend_from_slice(&wire);
    pre_tsig.write_mac_variables(&mut tbs, &key.name);

    let mac = key.algorithm.compute(&key.secret, &tbs)?;

    let mut signed = pre_tsig;
    signed.mac = mac.clone();
    message.set_tsig(Some(ResourceRecord::new(
        key.name.clone(),
        Type::Known(RecordType::TSIG),
        Class::Known(crate::class::RecordClass::ANY),
        0,
        RData::Tsig(signed),
    )));

    Ok(mac)
}

/// Rebuilds the to-be-signed bytes for a received message: optional
/// prior MAC, header with the original id and the TSIG dropped from
/// ARCOUNT, the records verbatim, then the TSIG variables.
fn message_tbs(
    wire: &[u8],
    tsig_start: usize,
    tsig: &Tsig,
    key_name: &Name,
    prior_mac: Option<&[u8]>,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(wire.len() + 128);

    if let Some(prior) = prior_mac {
        buf.extend_from_slice(&(prior.len() as u16).to_be_bytes());
        buf.extend_from_slice(prior);
    }

    buf.extend_from_slice(&tsig.original_id.to_be_bytes());
    buf.extend_from_slice(&wire[2..10]);
    let ar_count = u16::from_be_bytes([wire[10], wire[11]]).saturating_sub(1);
    buf.extend_from_slice(&ar_count.to_be_bytes());
    buf.extend_from_slice(&wire[HEADER_SIZE..tsig_start]);

    tsig.write_mac_variables(&mut buf, key_name);
    buf.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::RecordClass;
    use crate::question::Question;

    fn test_key() -> TsigKey {
        TsigKey::new(
            Name::from_str("ksdns.tsigKey.").unwrap(),
            TsigAlgorithm::HmacSha256,
            vec![0x5a; 32],
        )
    }

    fn query() -> Message {
        Message::query(
            0x77aa,
            Question::new(
                Name::from_str("example.org.").unwrap(),
                RecordType::AXFR,
                RecordClass::IN,
            ),
        )
    }

    #[test]
    fn sign_verify_roundtrip() {
        let key = test_key();
        let now = 1_700_000_000;
        let mut msg = query();

        let mac = sign_message(&mut msg, &key, None, now).unwrap();
        assert_eq!(mac.len(), 32);

        let wire = msg.to_wire();
        let verified = verify_message(&wire, &key, None, now + 10).unwrap();
        assert_eq!(verified.mac, mac);
        assert_eq!(verified.original_id, 0x77aa);
    }

    #[test]
    fn tampering_is_detected() {
        let key = test_key();
        let now = 1_700_000_000;
        let mut msg = query();
        sign_message(&mut msg, &key, None, now).unwrap();

        let mut wire = msg.to_wire().to_vec();
        // Flip a bit inside the question name.
        wire[HEADER_SIZE + 1] ^= 0x01;
        assert!(matches!(
            verify_message(&wire, &key, None, now),
            Err(TsigError::BadMac(_))
        ));
    }

    #[test]
    fn wrong_key_rejected() {
        let key = test_key();
        let other = TsigKey::new(
            Name::from_str("ksdns.tsigKey.").unwrap(),
            TsigAlgorithm::HmacSha256,
            vec![0x11; 32],
        );
        let now = 1_700_000_000;
        let mut msg = query();
        sign_message(&mut msg, &key, None, now).unwrap();

        let wire = msg.to_wire();
        assert!(matches!(
            verify_message(&wire, &other, None, now),
            Err(TsigError::BadMac(_))
        ));
    }

    #[test]
    fn stale_signature_rejected() {
        let key = test_key();
        let now = 1_700_000_000;
        let mut msg = query();
        sign_message(&mut msg, &key, None, now).unwrap();

        let wire = msg.to_wire();
        let later = now + DEFAULT_FUDGE as u64 + 1;
        assert!(matches!(
            verify_message(&wire, &key, None, later),
            Err(TsigError::BadTime { .. })
        ));
    }

    #[test]
    fn response_chains_request_mac() {
        let key = test_key();
        let now = 1_700_000_000;
        let mut request = query();
        let request_mac = sign_message(&mut request, &key, None, now).unwrap();

        let mut response = Message::response_from(&request);
        let response_mac =
            sign_message(&mut response, &key, Some(&request_mac), now).unwrap();

        let wire = response.to_wire();
        // Verifying without the request MAC must fail; with it, succeed.
        assert!(verify_message(&wire, &key, None, now).is_err());
        let verified = verify_message(&wire, &key, Some(&request_mac), now).unwrap();
        assert_eq!(verified.mac, response_mac);
    }

    #[test]
    fn base64_secret() {
        let key = TsigKey::from_base64(
            Name::from_str("k.").unwrap(),
            TsigAlgorithm::HmacSha256,
            &BASE64.encode(&[7u8; 32]),
        )
        .unwrap();
        assert_eq!(key.secret.len(), 32);
    }
}
