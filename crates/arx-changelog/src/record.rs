//! Change records.

use arx_proto::{Name, ResourceRecord};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of mutation a change record describes.
///
/// The numeric values are part of the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A record was inserted.
    Insert,
    /// A record with exactly this rdata was removed.
    Remove,
    /// Every record at a name was removed (reserved).
    RemoveName,
    /// An entire rrset was removed (reserved).
    RemoveRrset,
}

impl ChangeKind {
    /// Returns the on-disk numeric value.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Insert => 0,
            Self::Remove => 1,
            Self::RemoveName => 2,
            Self::RemoveRrset => 3,
        }
    }

    /// Converts from the on-disk numeric value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Insert),
            1 => Some(Self::Remove),
            2 => Some(Self::RemoveName),
            3 => Some(Self::RemoveRrset),
            _ => None,
        }
    }
}

impl Serialize for ChangeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_u8())
    }
}

impl<'de> Deserialize<'de> for ChangeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| de::Error::custom(format!("unknown change kind {value}")))
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::RemoveName => "remove-name",
            Self::RemoveRrset => "remove-rrset",
        };
        f.write_str(name)
    }
}

/// One durable zone mutation.
///
/// The JSON field names (`Type`, `Record`, `Zone`) are the on-disk
/// format; `offset` is derived from the record's position in the log
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// What happened.
    #[serde(rename = "Type")]
    pub kind: ChangeKind,
    /// The affected record, in presentation form.
    #[serde(rename = "Record")]
    pub record: String,
    /// The origin of the zone the record belongs to.
    #[serde(rename = "Zone")]
    pub zone: String,
    /// Absolute position in the log, filled in by reads.
    #[serde(skip)]
    pub offset: u64,
}

impl ChangeRecord {
    /// Creates a change record for `rr` in `zone`.
    pub fn new(zone: &Name, rr: &ResourceRecord, kind: ChangeKind) -> Self {
        Self {
            kind,
            record: rr.to_string(),
            zone: zone.to_string(),
            offset: 0,
        }
    }

    /// Parses the stored presentation text back into a record, for
    /// replay.
    pub fn parse_record(&self) -> arx_proto::Result<ResourceRecord> {
        ResourceRecord::from_str(&self.record)
    }
}
