//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (48 bytes, little-endian)                         │
//! │   Version: u32 (4) | Reserved (4)                        │
//! │   NumEntries: u64 (8) | CreationTimestampUs: u64 (8)     │
//! │   MinKey: u64 (8) | MaxKey: u64 (8) | HeaderSize: u64 (8)│
//! ├──────────────────────────────────────────────────────────┤
//! │ Records (NumEntries × (K::WIDTH + V::WIDTH) bytes)       │
//! │   [Key][Value]                                           │
//! │   ... repeated, strictly ascending by key ...            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The reserved word keeps the u64 fields 8-byte aligned. Readers locate the
//! record region through `HeaderSize`, never through the constant.

mod builder;
mod reader;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};

use crate::error::{KvError, Result};
use crate::types::SortKey;

pub(crate) use builder::write_table;
pub use builder::SSTableBuilder;
pub use reader::SSTableFile;

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Current SSTable format version
pub const FORMAT_VERSION: u32 = 1;

/// Header size: Version (4) + Reserved (4) + 5 × u64 (40) = 48 bytes
pub const HEADER_SIZE: u64 = 48;

/// Filename prefix for SSTables in a database directory
pub(crate) const FILE_PREFIX: &str = "sst_";

/// Filename extension for SSTables
pub(crate) const FILE_EXTENSION: &str = ".db";

/// `<dir>/sst_<timestamp_us>.db`
pub(crate) fn table_path(dir: &Path, timestamp_us: u64) -> PathBuf {
    dir.join(format!("{}{}{}", FILE_PREFIX, timestamp_us, FILE_EXTENSION))
}

/// Wall-clock time in microseconds since the Unix epoch
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// =============================================================================
// SSTable Header
// =============================================================================

/// Fixed-size header written once at the start of every SSTable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SSTableHeader {
    /// Format version
    pub version: u32,
    /// Number of records
    pub num_entries: u64,
    /// Creation time, microseconds since the Unix epoch
    pub creation_timestamp_us: u64,
    /// Smallest key, as its header word
    pub min_key: u64,
    /// Largest key, as its header word
    pub max_key: u64,
    /// Byte offset of the first record
    pub header_size: u64,
}

impl SSTableHeader {
    /// Serialize to the on-disk layout
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.version);
        buf.put_u32_le(0); // Reserved
        buf.put_u64_le(self.num_entries);
        buf.put_u64_le(self.creation_timestamp_us);
        buf.put_u64_le(self.min_key);
        buf.put_u64_le(self.max_key);
        buf.put_u64_le(self.header_size);
        out
    }

    /// Parse and validate a header
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(KvError::Corruption(format!(
                "SSTable header truncated: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut buf = bytes;
        let version = buf.get_u32_le();
        let _reserved = buf.get_u32_le();
        let header = Self {
            version,
            num_entries: buf.get_u64_le(),
            creation_timestamp_us: buf.get_u64_le(),
            min_key: buf.get_u64_le(),
            max_key: buf.get_u64_le(),
            header_size: buf.get_u64_le(),
        };

        if header.version != FORMAT_VERSION {
            return Err(KvError::Corruption(format!(
                "Unsupported SSTable version: {}",
                header.version
            )));
        }
        if header.header_size < HEADER_SIZE {
            return Err(KvError::Corruption(format!(
                "SSTable header_size {} is smaller than the {}-byte header",
                header.header_size, HEADER_SIZE
            )));
        }

        Ok(header)
    }

    /// Smallest key held by the table
    pub fn min<K: SortKey>(&self) -> K {
        K::from_header_word(self.min_key)
    }

    /// Largest key held by the table
    pub fn max<K: SortKey>(&self) -> K {
        K::from_header_word(self.max_key)
    }

    /// Whether `[start, end]` intersects `[min, max]`
    pub fn overlaps<K: SortKey>(&self, start: &K, end: &K) -> bool {
        *end >= self.min::<K>() && *start <= self.max::<K>()
    }

    /// Byte offset of record `index`.
    ///
    /// Only meaningful for `index < num_entries` on a header that passed
    /// `data_end` against its file.
    pub fn record_offset(&self, index: u64, record_size: u64) -> u64 {
        self.header_size + index * record_size
    }

    /// Byte offset just past the last record, or `None` if it overflows u64
    pub fn data_end(&self, record_size: u64) -> Option<u64> {
        self.num_entries
            .checked_mul(record_size)?
            .checked_add(self.header_size)
    }
}
