//! Ordered key-value store
//!
//! The history index and the block location index both live in an ordered
//! byte-keyed store. Reads are point lookups and range cursors; writes are
//! atomic batches.
//!
//! # Cursor semantics
//!
//! A fresh [`RangeIterator`] sits before the first entry of its range.
//! `next()` from there moves onto the first entry, and `prev()` after the
//! cursor has run off the end moves back onto the last entry. A cursor reads
//! a snapshot taken when it was opened; later writes are not visible to it.

mod errors;
mod iterator;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use iterator::{RangeIterator, SnapshotIterator};
pub use memory::{MemStore, WriteBatch};

/// Ordered store contract consumed by the history scanners and the block
/// store.
pub trait OrderedStore: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Opens a cursor over `[start, end)`.
    fn iterator(&self, start: &[u8], end: &[u8]) -> StoreResult<Box<dyn RangeIterator>>;

    /// Applies every operation of `batch` atomically.
    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()>;
}
