//! # arx zone management
//!
//! In-memory zone values with RFC 1035 master-file parsing, and the
//! registry that pairs each origin's *static* zone (from the source)
//! with its *dynamic* zone (accumulated RFC 2136 updates) and change
//! log. Queries and transfers are answered from merged snapshots, never
//! from live zone state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod registry;
mod store;
mod zonefile;

pub use registry::{
    NullSink, Registry, RegistryConfig, SinkError, ZoneEvent, ZonePair, ZoneSink, ZoneSource,
};
pub use store::{LookupAnswer, LookupResult, Node, RrSet, Transfer, Zone};
pub use zonefile::{parse_zone, Parser};

use arx_proto::Name;
use thiserror::Error;

/// Errors from zone parsing, mutation, and registry operations.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// Malformed master-file input.
    #[error("parse error at {file}:{line}: {message}")]
    Parse {
        /// Input name (a path, or "inline" for text).
        file: String,
        /// One-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The input had no SOA record for the origin.
    #[error("zone {0} has no SOA record")]
    NoSoa(Name),

    /// The sentinel: the zone on disk still carries the serial the
    /// caller already has, so there is nothing to install.
    #[error("zone {origin} unchanged, still at serial {serial}")]
    SerialUnchanged {
        /// The zone origin.
        origin: Name,
        /// The unchanged serial.
        serial: u32,
    },

    /// A record violates zone invariants and cannot be inserted.
    #[error("bad RR: {0}")]
    BadRr(String),

    /// The origin is not served here.
    #[error("not authoritative for {0}")]
    NotAuthoritative(Name),

    /// Protocol-level failure.
    #[error(transparent)]
    Proto(#[from] arx_proto::Error),

    /// Change-log failure.
    #[error(transparent)]
    ChangeLog(#[from] arx_changelog::LogError),

    /// File I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for zone operations.
pub type Result<T> = std::result::Result<T, ZoneError>;
