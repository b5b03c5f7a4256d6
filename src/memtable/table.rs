//! MemTable implementation
//!
//! Size-bounded BalancedTree wrapped in a RwLock.

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::types::{entry_size, Entry, FixedWidth};

use super::BalancedTree;

/// In-memory table for recent writes
///
/// ## Budget
/// Every accepted put charges `K::WIDTH + V::WIDTH` bytes, including puts that
/// overwrite an existing key. A put that would push the total past the limit
/// is rejected without touching any state; the caller is expected to flush
/// and retry.
pub struct MemTable<K, V> {
    inner: RwLock<Inner<K, V>>,
    /// Fixed byte budget
    limit: usize,
}

struct Inner<K, V> {
    tree: BalancedTree<K, V>,
    current_size: usize,
}

impl<K: FixedWidth + Ord, V: FixedWidth> MemTable<K, V> {
    const ENTRY_SIZE: usize = entry_size::<K, V>();

    /// Create a new empty MemTable with the given byte budget
    pub fn new(limit: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                tree: BalancedTree::new(),
                current_size: 0,
            }),
            limit,
        }
    }

    /// Create a MemTable sized from the config
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.memtable_size_limit)
    }

    /// Put a key-value pair (write lock)
    ///
    /// Returns `CapacityExceeded` if the entry does not fit in the remaining budget.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        let mut inner = self.inner.write();

        if inner.current_size + Self::ENTRY_SIZE > self.limit {
            return Err(KvError::CapacityExceeded {
                entry_size: Self::ENTRY_SIZE,
                current_size: inner.current_size,
                limit: self.limit,
            });
        }

        inner.tree.put(key, value);
        inner.current_size += Self::ENTRY_SIZE;
        Ok(())
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &K) -> Result<V> {
        self.inner
            .read()
            .tree
            .get(key)
            .copied()
            .ok_or(KvError::KeyNotFound)
    }

    /// All entries with `start <= key <= end`, in ascending key order
    pub fn scan(&self, start: &K, end: &K) -> Vec<Entry<K, V>> {
        self.inner.read().tree.scan(start, end)
    }

    /// Entire contents in ascending key order (flush input)
    pub fn entries(&self) -> Vec<Entry<K, V>> {
        let inner = self.inner.read();
        inner.tree.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// True once the budget is fully used.
    ///
    /// Uses `>=` while `put` rejects on `>`, so a table filled exactly to its
    /// limit reports that it needs a flush.
    pub fn needs_flush(&self) -> bool {
        self.inner.read().current_size >= self.limit
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tree.clear();
        inner.current_size = 0;
    }

    /// Hand the sorted contents to `persist` and clear the table if it succeeds.
    ///
    /// The write lock is held throughout, so no put can land between the
    /// extraction and the clear. Returns `Ok(None)` for an empty table; on
    /// error the contents are left in place.
    pub fn flush_with<T, F>(&self, persist: F) -> Result<Option<T>>
    where
        F: FnOnce(&[Entry<K, V>]) -> Result<T>,
    {
        let mut inner = self.inner.write();
        if inner.tree.is_empty() {
            return Ok(None);
        }

        let entries: Vec<Entry<K, V>> = inner.tree.iter().map(|(k, v)| (*k, *v)).collect();
        let persisted = persist(&entries)?;

        inner.tree.clear();
        inner.current_size = 0;
        Ok(Some(persisted))
    }

    /// Bytes charged against the budget so far
    pub fn current_size(&self) -> usize {
        self.inner.read().current_size
    }

    /// The fixed byte budget
    pub fn size_limit(&self) -> usize {
        self.limit
    }

    /// Number of distinct keys held
    pub fn entry_count(&self) -> usize {
        self.inner.read().tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().tree.is_empty()
    }
}
