//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{KvError, Result};
use crate::types::{entry_size, Entry, FixedWidth, SortKey};

use super::{SSTableHeader, FORMAT_VERSION, HEADER_SIZE};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder<K, V> {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Stamped into the header
    creation_timestamp_us: u64,
    /// Number of records written
    entry_count: u64,
    /// Track min/max keys for the header
    min_key: Option<K>,
    max_key: Option<K>,
    /// Reused encode buffer, one record wide
    record: BytesMut,
    _value: PhantomData<V>,
}

impl<K: SortKey, V: FixedWidth> SSTableBuilder<K, V> {
    /// Create a new SSTable builder
    ///
    /// Writes a zeroed header immediately; call `add()` in strictly ascending
    /// key order, then `finish()` to fill the header in.
    ///
    /// Fails with `Io` (`AlreadyExists`) if `path` exists; SSTables are never
    /// overwritten.
    pub fn new(path: &Path, creation_timestamp_us: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Placeholder header, rewritten in finish()
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            creation_timestamp_us,
            entry_count: 0,
            min_key: None,
            max_key: None,
            record: BytesMut::with_capacity(entry_size::<K, V>()),
            _value: PhantomData,
        })
    }

    /// Append a record; keys must be strictly ascending
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        if let Some(last) = self.max_key {
            if key <= last {
                return Err(KvError::MalformedInput(format!(
                    "SSTable entries must be strictly ascending (record {} is out of order)",
                    self.entry_count
                )));
            }
        }

        self.record.clear();
        key.encode(&mut self.record);
        value.encode(&mut self.record);
        self.writer.write_all(&self.record)?;

        if self.min_key.is_none() {
            self.min_key = Some(key);
        }
        self.max_key = Some(key);
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: write the header and return it
    ///
    /// Fails with `MalformedInput` if no records were added.
    pub fn finish(self, sync: bool) -> Result<SSTableHeader> {
        let (min_key, max_key) = match (self.min_key, self.max_key) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(KvError::MalformedInput(
                    "cannot create an SSTable from zero entries".to_string(),
                ))
            }
        };

        let header = SSTableHeader {
            version: FORMAT_VERSION,
            num_entries: self.entry_count,
            creation_timestamp_us: self.creation_timestamp_us,
            min_key: min_key.to_header_word(),
            max_key: max_key.to_header_word(),
            header_size: HEADER_SIZE,
        };

        // Flush records, then seek back and fill in the header
        let mut file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.encode())?;
        if sync {
            file.sync_all()?;
        }

        tracing::debug!(
            "Created SSTable {} ({} entries)",
            self.path.display(),
            header.num_entries
        );

        Ok(header)
    }
}

/// Write `entries` to a new SSTable at `path`.
///
/// Refuses to replace an existing file. If writing fails after the file was
/// created, the partial file is removed; an existing file is never touched.
pub(crate) fn write_table<K: SortKey, V: FixedWidth>(
    path: &Path,
    entries: &[Entry<K, V>],
    creation_timestamp_us: u64,
    sync: bool,
) -> Result<SSTableHeader> {
    if entries.is_empty() {
        return Err(KvError::MalformedInput(
            "cannot create an SSTable from zero entries".to_string(),
        ));
    }

    let builder = SSTableBuilder::new(path, creation_timestamp_us)?;

    // From here on the file is ours to clean up
    let result = fill(builder, entries, sync);
    if result.is_err() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove partial SSTable {}: {}", path.display(), e);
        }
    }
    result
}

fn fill<K: SortKey, V: FixedWidth>(
    mut builder: SSTableBuilder<K, V>,
    entries: &[Entry<K, V>],
    sync: bool,
) -> Result<SSTableHeader> {
    for &(key, value) in entries {
        builder.add(key, value)?;
    }
    builder.finish(sync)
}
