//! # arx change log
//!
//! A durable, append-only log of zone mutations, one log per zone.
//! Records are framed with a 4-byte big-endian length in a *store*
//! file; a fixed-width *index* file maps relative offsets to store
//! positions. A log is an ordered sequence of such segments, the last
//! of which is active; sealed segments are read-only and may be removed
//! wholesale by truncation.
//!
//! On-disk layout under the log directory:
//!
//! ```text
//! 00000000000000000000.store
//! 00000000000000000000.index
//! 00000000000000000023.store
//! 00000000000000000023.index
//! ```
//!
//! Each base name is the segment's first absolute offset zero-padded to
//! twenty digits, so a directory scan recovers the segment order.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod index;
mod log;
mod record;
mod segment;
mod store;

pub use log::{decode_frames, Log, LogReader};
pub use record::{ChangeKind, ChangeRecord};

use thiserror::Error;

/// Errors from change-log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// Underlying file I/O failed; the append is not durable.
    #[error("change log I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The requested offset is outside `[lowest, highest]`.
    #[error("offset {0} out of range")]
    OffsetOutOfRange(u64),

    /// A stored record did not decode.
    #[error("corrupt record at offset {offset}: {source}")]
    Corrupt {
        /// The offset of the bad record.
        offset: u64,
        /// The decode failure.
        source: serde_json::Error,
    },

    /// A record did not encode.
    #[error("encoding record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result type for change-log operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// Log configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Per-segment limits.
    pub segment: SegmentConfig,
}

/// Per-segment size caps. Zero means the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentConfig {
    /// Soft cap on the store file, bytes.
    pub max_store_bytes: u64,
    /// Soft cap on the index file, bytes.
    pub max_index_bytes: u64,
}

impl SegmentConfig {
    pub(crate) const DEFAULT_MAX_STORE_BYTES: u64 = 1024 * 1024;
    pub(crate) const DEFAULT_MAX_INDEX_BYTES: u64 = 1024 * 1024;

    pub(crate) fn max_store_bytes(&self) -> u64 {
        if self.max_store_bytes == 0 {
            Self::DEFAULT_MAX_STORE_BYTES
        } else {
            self.max_store_bytes
        }
    }

    pub(crate) fn max_index_bytes(&self) -> u64 {
        if self.max_index_bytes == 0 {
            Self::DEFAULT_MAX_INDEX_BYTES
        } else {
            self.max_index_bytes
        }
    }
}
