//! In-memory ordered store
//!
//! BTreeMap-backed, so iteration order is byte-lexicographic and
//! deterministic.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::iterator::{RangeIterator, SnapshotIterator};
use super::OrderedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered list of puts and deletes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a put.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete(key.into()));
        self
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Ordered store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemStore {
    tree: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the store. Every later operation fails with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.tree.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single put, applied as a one-operation batch.
    pub fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(batch)
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl OrderedStore for MemStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check_open()?;
        let tree = self.tree.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tree.get(key).cloned())
    }

    fn iterator(&self, start: &[u8], end: &[u8]) -> StoreResult<Box<dyn RangeIterator>> {
        self.check_open()?;
        if start > end {
            return Err(StoreError::InvalidRange);
        }

        let tree = self.tree.read().map_err(|_| StoreError::Poisoned)?;
        let entries = tree
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Box::new(SnapshotIterator::new(entries)))
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_open()?;
        let mut tree = self.tree.write().map_err(|_| StoreError::Poisoned)?;
        for op in batch.ops {
            match op {
                BatchOp::Put(k, v) => {
                    tree.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    tree.remove(&k);
                }
            }
        }
        Ok(())
    }
}
