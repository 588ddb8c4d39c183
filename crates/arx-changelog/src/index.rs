//! The index file: fixed-width offset → position entries.

use crate::{LogError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Bytes per entry: `u32-BE relative offset || u64-BE store position`.
pub(crate) const ENTRY_WIDTH: u64 = 12;

/// A packed array of index entries, densely covering the segment's
/// offsets in order.
#[derive(Debug)]
pub(crate) struct Index {
    file: File,
    size: u64,
}

impl Index {
    /// Opens (creating if needed) an index file.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }

    /// Appends one entry.
    pub(crate) fn append(&mut self, rel_offset: u32, pos: u64) -> Result<()> {
        self.file.write_all(&rel_offset.to_be_bytes())?;
        self.file.write_all(&pos.to_be_bytes())?;
        self.size += ENTRY_WIDTH;
        Ok(())
    }

    /// Reads the `i`-th entry.
    pub(crate) fn read(&self, i: u64) -> Result<(u32, u64)> {
        if i >= self.entries() {
            return Err(LogError::OffsetOutOfRange(i));
        }
        let mut buf = [0u8; ENTRY_WIDTH as usize];
        self.file.read_exact_at(&mut buf, i * ENTRY_WIDTH)?;
        let rel = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let pos = u64::from_be_bytes(buf[4..12].try_into().unwrap());
        Ok((rel, pos))
    }

    /// Returns the number of entries.
    pub(crate) fn entries(&self) -> u64 {
        self.size / ENTRY_WIDTH
    }

    /// Returns the current size in bytes.
    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Flushes buffered writes to disk.
    pub(crate) fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.index");

        let mut index = Index::open(&path).unwrap();
        assert_eq!(index.entries(), 0);
        assert!(index.read(0).is_err());

        index.append(0, 0).unwrap();
        index.append(1, 29).unwrap();

        assert_eq!(index.entries(), 2);
        assert_eq!(index.read(0).unwrap(), (0, 0));
        assert_eq!(index.read(1).unwrap(), (1, 29));

        drop(index);
        let index = Index::open(&path).unwrap();
        assert_eq!(index.entries(), 2);
        assert_eq!(index.read(1).unwrap(), (1, 29));
    }
}
