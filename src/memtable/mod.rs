//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Enforce a fixed byte budget (flush signal)
//! - Ordered extraction for SSTable creation
//!
//! ## Data Structure Choice
//! An arena-backed AVL tree (`BalancedTree`):
//! - Ordered keys (required for SSTable generation)
//! - O(log n) put/get, O(n) range scan
//! - Wrapped in a RwLock by `MemTable` so the budget check and insert are atomic

mod table;
mod tree;

pub use table::MemTable;
pub use tree::{BalancedTree, Iter};
