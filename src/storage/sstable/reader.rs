//! SSTable Reader
//!
//! Handle over one SSTable file: O(log n) point lookups and range scans via
//! positioned reads, without loading the record region into memory.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::types::{entry_size, Entry, FixedWidth, SortKey};

use super::builder::write_table;
use super::{now_micros, table_path, SSTableHeader, HEADER_SIZE};

/// Handle to an immutable SSTable file
///
/// The file is opened lazily by `get`/`scan` (or explicitly with `open`) and
/// released by `close` or on drop. The header stays cached after close so
/// range checks keep working.
#[derive(Debug)]
pub struct SSTableFile<K, V> {
    path: PathBuf,
    /// Read-only handle, `None` while closed
    file: Option<File>,
    header: Option<SSTableHeader>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SSTableFile<K, V> {
    /// Create a handle for the file at `path` without opening it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            header: None,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached header, available once the file has been opened
    pub fn header(&self) -> Option<&SSTableHeader> {
        self.header.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Release the file handle. Idempotent.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!("Closed SSTable {}", self.path.display());
        }
    }

    /// Open handle plus header; only valid after a successful `open`
    fn handle(&self) -> Result<(&File, SSTableHeader)> {
        match (&self.file, self.header) {
            (Some(file), Some(header)) => Ok((file, header)),
            _ => Err(KvError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "SSTable is not open",
            ))),
        }
    }
}

impl<K: SortKey, V: FixedWidth> SSTableFile<K, V> {
    const RECORD_SIZE: usize = entry_size::<K, V>();

    /// Write `entries` (strictly ascending by key) to a new SSTable at `path`.
    ///
    /// Fails with `MalformedInput` on empty or unsorted input. The caller
    /// picks a collision-free path, usually via `generate_filename`.
    pub fn create(path: &Path, entries: &[Entry<K, V>]) -> Result<SSTableHeader> {
        write_table(path, entries, now_micros(), true)
    }

    /// Open the file read-only and load its header. Idempotent.
    ///
    /// A header whose record region does not fit in the file is `Corruption`,
    /// so every record index below `num_entries` is readable afterwards.
    pub fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        let file = File::open(&self.path)?;
        let mut bytes = [0u8; HEADER_SIZE as usize];
        read_exact_at(&file, &mut bytes, 0)?;
        let header = SSTableHeader::decode(&bytes)?;

        let file_len = file.metadata()?.len();
        match header.data_end(Self::RECORD_SIZE as u64) {
            Some(end) if end <= file_len => {}
            _ => {
                return Err(KvError::Corruption(format!(
                    "SSTable {} claims {} records but is only {} bytes",
                    self.path.display(),
                    header.num_entries,
                    file_len
                )))
            }
        }

        tracing::debug!(
            "Opened SSTable {} ({} entries)",
            self.path.display(),
            header.num_entries
        );

        self.header = Some(header);
        self.file = Some(file);
        Ok(())
    }

    /// `<db_path>/sst_<now_us>.db`
    pub fn generate_filename(db_path: &Path) -> PathBuf {
        table_path(db_path, now_micros())
    }

    /// Point lookup by binary search, one positioned read per probe.
    ///
    /// Returns `KeyNotFound` when the key is absent; a failed or short read
    /// surfaces as `Io` so callers can tell the two apart.
    pub fn get(&mut self, key: &K) -> Result<V> {
        self.open()?;
        let (file, header) = self.handle()?;

        if !header.overlaps(key, key) {
            return Err(KvError::KeyNotFound);
        }

        let (mut lo, mut hi) = (0u64, header.num_entries);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (probe, value) = read_record::<K, V>(file, &header, mid)?;

            match probe.cmp(key) {
                std::cmp::Ordering::Equal => {
                    tracing::trace!("SSTable {} hit at record {}", self.path.display(), mid);
                    return Ok(value);
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }

        Err(KvError::KeyNotFound)
    }

    /// All records with `start <= key <= end`, ascending.
    ///
    /// Binary-searches for the first key `>= start`, then reads sequentially.
    /// If the file shrinks under an open handle, a short read ends the scan
    /// with what was read so far.
    pub fn scan(&mut self, start: &K, end: &K) -> Result<Vec<Entry<K, V>>> {
        self.open()?;
        let (file, header) = self.handle()?;

        let mut out = Vec::new();
        if !header.overlaps(start, end) {
            return Ok(out);
        }

        let Some(first) = first_at_least::<K, V>(file, &header, start)? else {
            return Ok(out);
        };

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(
            header.record_offset(first, Self::RECORD_SIZE as u64),
        ))?;

        let mut record = vec![0u8; Self::RECORD_SIZE];
        for index in first..header.num_entries {
            if let Err(e) = reader.read_exact(&mut record) {
                tracing::warn!(
                    "Short read in {} at record {}: {}",
                    self.path.display(),
                    index,
                    e
                );
                break;
            }

            let mut buf = &record[..];
            let key = K::decode(&mut buf);
            if key > *end {
                break;
            }
            out.push((key, V::decode(&mut buf)));
        }

        Ok(out)
    }

    /// Whether `[start, end]` overlaps this table's key range.
    ///
    /// Pure header check; false if the header has never been loaded.
    pub fn contains_key_range(&self, start: &K, end: &K) -> bool {
        self.header
            .as_ref()
            .is_some_and(|header| header.overlaps(start, end))
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Read and decode record `index`
fn read_record<K: SortKey, V: FixedWidth>(
    file: &File,
    header: &SSTableHeader,
    index: u64,
) -> Result<Entry<K, V>> {
    let record_size = entry_size::<K, V>();
    let mut record = vec![0u8; record_size];
    read_exact_at(file, &mut record, header.record_offset(index, record_size as u64))?;

    let mut buf = &record[..];
    let key = K::decode(&mut buf);
    let value = V::decode(&mut buf);
    Ok((key, value))
}

/// Index of the first record with key `>= target`, if any
fn first_at_least<K: SortKey, V: FixedWidth>(
    file: &File,
    header: &SSTableHeader,
    target: &K,
) -> Result<Option<u64>> {
    let (mut lo, mut hi) = (0u64, header.num_entries);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (key, _) = read_record::<K, V>(file, header, mid)?;
        if key >= *target {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok((lo < header.num_entries).then_some(lo))
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
