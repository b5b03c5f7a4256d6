//! Storage Module
//!
//! Persistent storage layer using fixed-record SSTables.
//!
//! ## Responsibilities
//! - Persist sorted entries to disk, write once / read many
//! - O(log n) point lookups and range scans via positioned reads
//! - Newest-first shadowing across SSTables
//! - Recovery by scanning the database directory
//!
//! See [`sstable`] for the on-disk layout.

pub mod sstable;
mod manager;

pub use manager::SSTableManager;
pub use sstable::{SSTableBuilder, SSTableFile, SSTableHeader};
