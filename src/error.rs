//! Error types for lsmkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for lsmkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // MemTable Errors
    // -------------------------------------------------------------------------
    #[error(
        "MemTable capacity exceeded: entry of {entry_size} bytes does not fit ({current_size}/{limit} bytes used)"
    )]
    CapacityExceeded {
        entry_size: usize,
        current_size: usize,
        limit: usize,
    },

    // -------------------------------------------------------------------------
    // SSTable Errors
    // -------------------------------------------------------------------------
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("SSTable corruption detected: {0}")]
    Corruption(String),
}

impl KvError {
    /// True for a plain lookup miss, as opposed to a failure to read.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::KeyNotFound)
    }
}
