//! The store file: length-prefixed record bodies.

use crate::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Width of the length prefix.
pub(crate) const LEN_WIDTH: u64 = 4;

/// An append-only file of `u32-BE length || body` frames.
#[derive(Debug)]
pub(crate) struct Store {
    file: File,
    size: u64,
}

impl Store {
    /// Opens (creating if needed) a store file and seats the write
    /// position at its current end.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }

    /// Appends one frame and makes it durable before returning.
    ///
    /// Returns the position the frame begins at.
    pub(crate) fn append(&mut self, body: &[u8]) -> Result<u64> {
        let pos = self.size;
        self.file.write_all(&(body.len() as u32).to_be_bytes())?;
        self.file.write_all(body)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.size += LEN_WIDTH + body.len() as u64;
        Ok(pos)
    }

    /// Reads the frame starting at `pos`.
    pub(crate) fn read_at(&self, pos: u64) -> Result<Vec<u8>> {
        let mut len = [0u8; LEN_WIDTH as usize];
        self.file.read_exact_at(&mut len, pos)?;
        let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
        self.file.read_exact_at(&mut body, pos + LEN_WIDTH)?;
        Ok(body)
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
        let path = dir.path().join("test.store");

        let mut store = Store::open(&path).unwrap();
        let p0 = store.append(b"hello").unwrap();
        let p1 = store.append(b"change log").unwrap();

        assert_eq!(p0, 0);
        assert_eq!(p1, LEN_WIDTH + 5);
        assert_eq!(store.read_at(p0).unwrap(), b"hello");
        assert_eq!(store.read_at(p1).unwrap(), b"change log");

        // Sizes survive reopen.
        drop(store);
        let store = Store::open(&path).unwrap();
        assert_eq!(store.size(), 2 * LEN_WIDTH + 15);
        assert_eq!(store.read_at(p1).unwrap(), b"change log");
    }
}
