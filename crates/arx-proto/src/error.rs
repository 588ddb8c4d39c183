//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding, decoding, or validating DNS data.
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer ended before a complete value could be read.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Bytes required to continue.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A domain name label exceeded 63 octets.
    #[error("label too long: {0} octets")]
    LabelTooLong(usize),

    /// A domain name exceeded 255 octets in wire form.
    #[error("name too long: {0} octets")]
    NameTooLong(usize),

    /// A compression pointer loop or forward pointer was found.
    #[error("invalid compression pointer at offset {0}")]
    BadPointer(usize),

    /// A name contained an unknown label type.
    #[error("unsupported label type {0:#04x}")]
    BadLabelType(u8),

    /// Presentation-format input could not be parsed.
    #[error("invalid presentation data: {0}")]
    BadPresentation(String),

    /// Rdata did not match the expected shape for its type.
    #[error("malformed rdata for {rtype}: {message}")]
    BadRdata {
        /// The record type being parsed.
        rtype: &'static str,
        /// What went wrong.
        message: String,
    },

    /// More than one OPT record appeared in a message.
    #[error("multiple OPT records in message")]
    MultipleOpt,

    /// TSIG processing failed.
    #[error("tsig error: {0}")]
    Tsig(#[from] TsigError),
}

impl Error {
    /// Convenience constructor for truncated input.
    pub fn buffer_too_short(needed: usize, available: usize) -> Self {
        Self::BufferTooShort { needed, available }
    }

    /// Convenience constructor for presentation-format failures.
    pub fn presentation(message: impl Into<String>) -> Self {
        Self::BadPresentation(message.into())
    }

    /// Convenience constructor for rdata shape failures.
    pub fn rdata(rtype: &'static str, message: impl Into<String>) -> Self {
        Self::BadRdata {
            rtype,
            message: message.into(),
        }
    }
}

/// TSIG verification and signing failures (RFC 8945).
#[derive(Debug, Error)]
pub enum TsigError {
    /// The message carried no TSIG record where one was required.
    #[error("message is not signed")]
    Unsigned,

    /// The TSIG record was not the last record of the additional section.
    #[error("TSIG record is not last in the message")]
    NotLast,

    /// The key named in the TSIG record is not known to the verifier.
    #[error("unknown key {0}")]
    UnknownKey(String),

    /// The algorithm named in the TSIG record is not supported.
    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    /// The computed MAC did not match the one in the message.
    #[error("MAC verification failed for key {0}")]
    BadMac(String),

    /// The signing time was outside the fudge window.
    #[error("signature time {time} outside fudge window (now {now})")]
    BadTime {
        /// Time signed, seconds since the epoch.
        time: u64,
        /// Verifier's current time.
        now: u64,
    },

    /// The secret was not valid base64.
    #[error("invalid key secret: {0}")]
    BadSecret(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
