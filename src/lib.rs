//! ledger-history - history index of an append-only ledger
//!
//! Answers "what happened to this key" queries over committed blocks:
//! the full history of a key, a bounded version range, several keys at once,
//! and the keys updated most often over a block range.
//!
//! # Layers
//!
//! - [`codec`]: order-preserving integer encoding used in every index key
//! - [`kvstore`]: ordered byte-keyed store holding the index
//! - [`cache`]: bounded LRU used by the block store
//! - [`blockstore`]: append-only block storage and transaction retrieval
//! - [`history`]: key encoding and the query scanners
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod blockstore;
pub mod cache;
pub mod codec;
pub mod config;
pub mod history;
pub mod kvstore;

pub use config::HistoryConfig;
pub use history::{HistoryError, HistoryResult, QueryExecutor, ResultsIterator};
