//! # lsmkv
//!
//! A minimal log-structured key-value storage engine with:
//! - An AVL-tree MemTable with a fixed byte budget
//! - Immutable fixed-record SSTables with header-based range pruning
//! - A manager that shadows older SSTables and merges range scans
//!
//! ## Architecture Overview
//!
//! ```text
//!          put / get / scan
//!                 │
//!                 ▼
//!   ┌───────────────────────────┐
//!   │         MemTable          │
//!   │  (BalancedTree, RwLock)   │
//!   └─────────────┬─────────────┘
//!                 │ flush (sorted entries)
//!                 ▼
//!   ┌───────────────────────────┐
//!   │      SSTableManager       │
//!   │   (newest → oldest list)  │
//!   └─────────────┬─────────────┘
//!                 │
//!       ┌─────────┼─────────┐
//!       ▼         ▼         ▼
//!   sst_<t3>  sst_<t2>  sst_<t1>.db
//! ```
//!
//! Deciding when to flush is left to the embedding application: check
//! [`MemTable::needs_flush`] or react to [`KvError::CapacityExceeded`], then
//! call [`SSTableManager::flush`]. Reads consult the MemTable first, then the
//! manager.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod types;

pub mod memtable;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{KvError, Result};
pub use memtable::{BalancedTree, MemTable};
pub use storage::{SSTableFile, SSTableHeader, SSTableManager};
pub use types::{Entry, FixedWidth, SortKey};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of lsmkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
