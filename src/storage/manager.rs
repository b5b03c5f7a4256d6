//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge range scans across SSTables
//! - Create new SSTables from sorted entries (MemTable flushes)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::memtable::MemTable;
use crate::types::{Entry, FixedWidth, SortKey};

use super::sstable::{now_micros, table_path, write_table, FILE_EXTENSION, FILE_PREFIX};
use super::{SSTableFile, SSTableHeader};

/// Manages the SSTables of one database directory
///
/// ## Ordering
/// `sstables` is kept newest → oldest. A new table is prepended, and recovery
/// sorts by the timestamp in the filename, so index 0 is always the most
/// recent write and wins on lookups.
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock. Lookups and scans share the read lock;
///   the write lock is only taken to publish a new list or handle.
/// - Each handle has its own Mutex, since reads may (re)open the file
/// - `writer`: Serializes `add_sst` and `load_existing_ssts`, so a table is
///   never both discovered by a reload and prepended again, and prepends
///   happen in timestamp order
/// - `last_timestamp`: Atomic, strictly increasing across `add_sst` calls
/// - All methods use `&self`
pub struct SSTableManager<K, V> {
    /// Directory where SSTables are stored
    db_path: PathBuf,

    /// fsync new SSTables before publishing them
    sync_writes: bool,

    /// Open SSTable handles, ordered newest → oldest
    sstables: RwLock<Vec<Mutex<SSTableFile<K, V>>>>,

    /// Timestamp of the newest SSTable created or discovered
    last_timestamp: AtomicU64,

    /// Held while creating or rediscovering SSTables
    writer: Mutex<()>,
}

impl<K: SortKey, V: FixedWidth> SSTableManager<K, V> {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory (and parents) if it doesn't exist
    /// 2. Load existing SSTables newest first
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Open storage as described by the config
    pub fn with_config(config: &Config) -> Result<Self> {
        Self::open_with(&config.db_path, config.sync_writes)
    }

    fn open_with(path: &Path, sync_writes: bool) -> Result<Self> {
        fs::create_dir_all(path)?;

        let manager = Self {
            db_path: path.to_path_buf(),
            sync_writes,
            sstables: RwLock::new(Vec::new()),
            last_timestamp: AtomicU64::new(0),
            writer: Mutex::new(()),
        };
        manager.load_existing_ssts()?;

        Ok(manager)
    }

    /// Persist `entries` (strictly ascending) as a new SSTable and make it the
    /// first one consulted on reads.
    pub fn add_sst(&self, entries: &[Entry<K, V>]) -> Result<SSTableHeader> {
        if entries.is_empty() {
            return Err(KvError::MalformedInput(
                "cannot create an SSTable from zero entries".to_string(),
            ));
        }

        let _writer = self.writer.lock();
        let timestamp = self.next_timestamp();
        let path = table_path(&self.db_path, timestamp);

        let header = write_table(&path, entries, timestamp, self.sync_writes)?;

        let mut sstable = SSTableFile::new(path);
        sstable.open()?;

        // Acquire write lock and insert at front (newest first)
        self.sstables.write().insert(0, Mutex::new(sstable));

        Ok(header)
    }

    /// Flush a MemTable to a new SSTable and clear it
    ///
    /// Returns `Ok(None)` if the MemTable is empty. The MemTable stays locked
    /// for the duration, and is left untouched if the write fails.
    pub fn flush(&self, memtable: &MemTable<K, V>) -> Result<Option<SSTableHeader>> {
        memtable.flush_with(|entries| self.add_sst(entries))
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// A table that fails to read is logged and skipped, so the result is
    /// `KeyNotFound` unless some table returns the key.
    pub fn get(&self, key: &K) -> Result<V> {
        let sstables = self.sstables.read();

        for sstable in sstables.iter() {
            let mut sstable = sstable.lock();
            match sstable.get(key) {
                Ok(value) => return Ok(value),
                Err(KvError::KeyNotFound) => continue,
                Err(e) => {
                    tracing::warn!(
                        "Lookup in {} failed, skipping: {}",
                        sstable.path().display(),
                        e
                    );
                }
            }
        }

        Err(KvError::KeyNotFound)
    }

    /// All entries with `start <= key <= end` across every SSTable, ascending
    /// and with one entry per key.
    ///
    /// Results are gathered newest table first and stably sorted by key
    /// alone, so the first entry for each key comes from the newest table
    /// holding it, matching `get`.
    pub fn scan(&self, start: &K, end: &K) -> Vec<Entry<K, V>> {
        let sstables = self.sstables.read();

        let mut merged = Vec::new();
        for sstable in sstables.iter() {
            let mut sstable = sstable.lock();
            match sstable.scan(start, end) {
                Ok(entries) => merged.extend(entries),
                Err(e) => {
                    tracing::warn!(
                        "Scan of {} failed, skipping: {}",
                        sstable.path().display(),
                        e
                    );
                }
            }
        }

        merged.sort_by(|a, b| a.0.cmp(&b.0));
        merged.dedup_by(|later, earlier| later.0 == earlier.0);
        merged
    }

    /// Rebuild the SSTable list from the database directory.
    ///
    /// Files named `sst_<timestamp>.db` are opened newest first; anything
    /// that fails to open is logged and skipped. Returns the number loaded.
    ///
    /// Runs exclusively with `add_sst`: a concurrent add either finishes
    /// before the directory listing or starts after the new list is in place.
    pub fn load_existing_ssts(&self) -> Result<usize> {
        let _writer = self.writer.lock();

        let mut discovered: Vec<(u64, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.db_path)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.is_file() {
                if let Some(timestamp) = Self::parse_timestamp(&file_path) {
                    discovered.push((timestamp, file_path));
                }
            }
        }

        // Sort newest first (highest timestamp first)
        discovered.sort_by(|a, b| b.0.cmp(&a.0));

        let mut sstables = Vec::with_capacity(discovered.len());
        for (timestamp, path) in discovered {
            // Reserve the name even if the file is unreadable
            self.last_timestamp.fetch_max(timestamp, Ordering::SeqCst);

            let mut sstable = SSTableFile::new(path);
            match sstable.open() {
                Ok(()) => sstables.push(Mutex::new(sstable)),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable SSTable {}: {}",
                        sstable.path().display(),
                        e
                    );
                }
            }
        }

        let loaded = sstables.len();
        tracing::debug!(
            "Loaded {} SSTables from {}",
            loaded,
            self.db_path.display()
        );

        *self.sstables.write() = sstables;
        Ok(loaded)
    }

    /// Close every SSTable handle; the files stay on disk and reopen on demand
    pub fn close(&self) {
        for sstable in self.sstables.read().iter() {
            sstable.lock().close();
        }
    }

    /// Get the number of SSTables
    pub fn sst_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Sum of record counts over all SSTables with a loaded header
    pub fn total_entries(&self) -> u64 {
        self.sstables
            .read()
            .iter()
            .filter_map(|sstable| sstable.lock().header().map(|header| header.num_entries))
            .sum()
    }

    /// Get the database directory path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Paths of the managed SSTables, newest first
    pub fn sst_paths(&self) -> Vec<PathBuf> {
        self.sstables
            .read()
            .iter()
            .map(|sstable| sstable.lock().path().to_path_buf())
            .collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Current time in microseconds, bumped past the last issued timestamp so
    /// two tables created in the same microsecond get distinct names.
    fn next_timestamp(&self) -> u64 {
        let now = now_micros();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }

    /// Parse the timestamp from an SSTable filename
    /// "sst_1718000000000000.db" → Some(1718000000000000)
    fn parse_timestamp(path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXTENSION)?;
        stamp.parse().ok()
    }
}
