//! Bounded LRU cache
//!
//! A generic, fixed-capacity least-recently-used cache used beside the block
//! store to skip location lookups and file reads.
//!
//! # Invariants
//!
//! - Never holds more than `capacity` entries
//! - Inserting a new key into a full cache evicts exactly one entry, the least
//!   recently used one
//! - `get` and `put` are O(1) and serialized by a single lock
//! - A miss is reported as `None`; the cache is never a source of truth

mod lru;

pub use lru::{CacheStats, LruCache};
