//! The log: an ordered sequence of segments.

use crate::record::ChangeRecord;
use crate::segment::Segment;
use crate::store::LEN_WIDTH;
use crate::{Config, LogError, Result};
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// An append-only, offset-indexed log of [`ChangeRecord`]s.
///
/// Appends serialize through a writer lock; reads share a reader lock
/// and never block each other. The last segment is active; the rest are
/// read-only.
#[derive(Debug)]
pub struct Log {
    dir: PathBuf,
    config: Config,
    segments: RwLock<Vec<Segment>>,
}

impl Log {
    /// Opens the log in `dir`, creating the directory if needed.
    ///
    /// Existing segments are discovered from their filename-encoded
    /// base offsets; the highest becomes active and its write position
    /// is recovered from its index.
    pub fn open(dir: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut bases: Vec<u64> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".store") {
                if let Ok(base) = stem.parse::<u64>() {
                    bases.push(base);
                }
            }
        }
        bases.sort_unstable();

        let mut segments = Vec::with_capacity(bases.len().max(1));
        for base in &bases {
            segments.push(Segment::open(&dir, *base, config.segment)?);
        }
        if segments.is_empty() {
            segments.push(Segment::open(&dir, 0, config.segment)?);
        }
        debug!(dir = %dir.display(), segments = segments.len(), "change log opened");

        Ok(Self {
            dir,
            config,
            segments: RwLock::new(segments),
        })
    }

    /// Returns the log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends a record, sealing the active segment first when the
    /// record would push it past its caps. The record is durable on
    /// disk when this returns.
    pub fn append(&self, record: &ChangeRecord) -> Result<u64> {
        let body = serde_json::to_vec(record).map_err(LogError::Encode)?;

        let mut segments = self.segments.write();
        let needs_roll = {
            let active = segments.last().expect("log always has a segment");
            active.would_exceed(body.len())
        };
        if needs_roll {
            let base = segments.last().expect("log always has a segment").next_offset();
            debug!(base, "sealing segment");
            segments.push(Segment::open(&self.dir, base, self.config.segment)?);
        }
        segments
            .last_mut()
            .expect("log always has a segment")
            .append(&body)
    }

    /// Reads the record at `offset`.
    pub fn read(&self, offset: u64) -> Result<ChangeRecord> {
        let segments = self.segments.read();
        let segment = segments
            .iter()
            .find(|s| s.contains(offset))
            .ok_or(LogError::OffsetOutOfRange(offset))?;
        let body = segment.read(offset)?;
        let mut record: ChangeRecord =
            serde_json::from_slice(&body).map_err(|source| LogError::Corrupt { offset, source })?;
        record.offset = offset;
        Ok(record)
    }

    /// Returns the base offset of the oldest segment.
    pub fn lowest_offset(&self) -> u64 {
        let segments = self.segments.read();
        segments.first().expect("log always has a segment").base_offset()
    }

    /// Returns the offset of the last appended record. An empty log
    /// reports `lowest_offset() - 1` (wrapping at zero).
    pub fn highest_offset(&self) -> u64 {
        let segments = self.segments.read();
        segments
            .last()
            .expect("log always has a segment")
            .next_offset()
            .wrapping_sub(1)
    }

    /// Removes every segment whose highest offset is strictly below
    /// `lowest_keep`. If that would empty the log, a fresh segment is
    /// opened at the old end so appends continue with the next offset.
    pub fn truncate(&self, lowest_keep: u64) -> Result<()> {
        let mut segments = self.segments.write();
        let next = segments.last().expect("log always has a segment").next_offset();

        let mut kept = Vec::with_capacity(segments.len());
        for segment in segments.drain(..) {
            if segment.next_offset() > lowest_keep {
                kept.push(segment);
            } else {
                debug!(base = segment.base_offset(), "truncating segment");
                segment.remove()?;
            }
        }
        if kept.is_empty() {
            kept.push(Segment::open(&self.dir, next, self.config.segment)?);
        }
        *segments = kept;
        Ok(())
    }

    /// Returns a reader over the raw store bytes of every segment, in
    /// offset order. Each call starts a fresh pass; bytes appended
    /// after the call are not included.
    pub fn reader(&self) -> LogReader {
        let segments = self.segments.read();
        let parts = segments
            .iter()
            .map(|s| (s.store_path().to_path_buf(), s.store_size()))
            .collect();
        LogReader {
            parts,
            current: None,
            index: 0,
        }
    }

    /// Flushes every segment to disk.
    pub fn close(&self) -> Result<()> {
        let segments = self.segments.read();
        for segment in segments.iter() {
            segment.sync()?;
        }
        Ok(())
    }
}

/// Sequential reader over the concatenated store files of a log, for
/// bootstrap replay. Yields the raw length-prefixed frames.
#[derive(Debug)]
pub struct LogReader {
    parts: Vec<(PathBuf, u64)>,
    current: Option<(File, u64)>,
    index: usize,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.current.is_none() {
                let Some((path, size)) = self.parts.get(self.index) else {
                    return Ok(0);
                };
                self.current = Some((File::open(path)?, *size));
            }

            let (file, remaining) = self.current.as_mut().expect("set above");
            if *remaining == 0 {
                self.current = None;
                self.index += 1;
                continue;
            }

            let want = buf.len().min(*remaining as usize);
            let n = file.read(&mut buf[..want])?;
            if n == 0 {
                // Shorter than recorded; move on rather than spin.
                self.current = None;
                self.index += 1;
                continue;
            }
            *remaining -= n as u64;
            return Ok(n);
        }
    }
}

/// Decodes every frame a [`LogReader`] produced into records, assigning
/// offsets from `lowest` upward.
pub fn decode_frames(bytes: &[u8], lowest: u64) -> Result<Vec<ChangeRecord>> {
    let mut records = Vec::new();
    let mut pos = 0usize;
    let mut offset = lowest;
    while pos + LEN_WIDTH as usize <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += LEN_WIDTH as usize;
        if pos + len > bytes.len() {
            break;
        }
        let mut record: ChangeRecord = serde_json::from_slice(&bytes[pos..pos + len])
            .map_err(|source| LogError::Corrupt { offset, source })?;
        record.offset = offset;
        records.push(record);
        offset += 1;
        pos += len;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChangeKind;
    use crate::SegmentConfig;
    use arx_proto::{Name, ResourceRecord};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn small_config() -> Config {
        Config {
            segment: SegmentConfig {
                max_store_bytes: 32,
                max_index_bytes: 0,
            },
        }
    }

    fn sample_record() -> ChangeRecord {
        let zone = Name::from_str("example.com.").unwrap();
        let rr = ResourceRecord::a(
            Name::from_str("example.com.").unwrap(),
            3600,
            Ipv4Addr::new(127, 0, 0, 1),
        );
        ChangeRecord::new(&zone, &rr, ChangeKind::Insert)
    }

    #[test]
    fn append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();

        let record = sample_record();
        let offset = log.append(&record).unwrap();
        assert_eq!(offset, 0);

        let read = log.read(offset).unwrap();
        assert_eq!(read.record, record.record);
        assert_eq!(read.offset, 0);
    }

    #[test]
    fn offset_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        assert!(matches!(log.read(1), Err(LogError::OffsetOutOfRange(1))));
    }

    #[test]
    fn init_with_existing_segments() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record();
        {
            let log = Log::open(dir.path(), small_config()).unwrap();
            for _ in 0..3 {
                log.append(&record).unwrap();
            }
            log.close().unwrap();
            assert_eq!(log.lowest_offset(), 0);
            assert_eq!(log.highest_offset(), 2);
        }

        let log = Log::open(dir.path(), small_config()).unwrap();
        assert_eq!(log.lowest_offset(), 0);
        assert_eq!(log.highest_offset(), 2);
        assert_eq!(log.read(1).unwrap().record, record.record);
        // Appends continue where the old log left off.
        assert_eq!(log.append(&record).unwrap(), 3);
    }

    #[test]
    fn reader_concatenates_stores() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        let record = sample_record();
        for _ in 0..3 {
            log.append(&record).unwrap();
        }

        let mut bytes = Vec::new();
        log.reader().read_to_end(&mut bytes).unwrap();

        let records = decode_frames(&bytes, log.lowest_offset()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].record, record.record);
        assert_eq!(records[2].offset, 2);
    }

    #[test]
    fn truncate_drops_old_segments() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        let record = sample_record();
        for _ in 0..3 {
            log.append(&record).unwrap();
        }

        log.truncate(1).unwrap();
        assert!(log.read(0).is_err());
        assert_eq!(log.read(1).unwrap().offset, 1);
        assert!(log.lowest_offset() >= 1);
    }

    #[test]
    fn segments_roll_and_files_follow() {
        let dir = tempfile::tempdir().unwrap();
        let log = Log::open(dir.path(), small_config()).unwrap();
        let record = sample_record();

        // Each JSON body exceeds the 32-byte cap, so every record seals
        // the previous segment.
        let mut last = 0;
        while count_stores(dir.path()) < 3 {
            last = log.append(&record).unwrap();
        }
        assert_eq!(count_stores(dir.path()), 3);

        let third_base = last;
        log.truncate(third_base).unwrap();
        assert_eq!(count_stores(dir.path()), 1);
        assert_eq!(log.lowest_offset(), third_base);
        assert_eq!(log.read(third_base).unwrap().offset, third_base);
    }

    fn count_stores(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".store")
            })
            .count()
    }
}
