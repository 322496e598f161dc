//! Mutex-guarded, fixed-capacity LRU cache
//!
//! Entries live in a slot vector linked into a recency list (head = most
//! recently used). The hash map, the slots and the list are guarded by one
//! lock, so "check, promote-or-evict, insert" is a single atomic step.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

/// Cache statistics.
///
/// Passive only: nothing in the cache reads these to make decisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries removed to make room for a new key
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruInner<K, V> {
    map: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> LruInner<K, V> {
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;

        if let Some(old_head) = self.head {
            self.slots[old_head].prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }
}

/// Thread-safe LRU cache holding at most `capacity` entries.
///
/// A miss is always `None`. The cache is a speed layer only; callers must be
/// able to recompute any value it drops.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Creates an empty cache.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(LruInner {
                map: HashMap::with_capacity(capacity.min(4096)),
                slots: Vec::with_capacity(capacity.min(4096)),
                head: None,
                tail: None,
                capacity,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruInner<K, V>> {
        // Poisoning is ignored: the worst a panicking holder leaves is a miss.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up `key`, promoting it to most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        match inner.map.get(key).copied() {
            Some(idx) => {
                inner.promote(idx);
                inner.stats.hits += 1;
                Some(inner.slots[idx].value.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts or updates `key`.
    ///
    /// An existing key is updated in place and promoted. A new key on a full
    /// cache evicts exactly the least recently used entry, which is returned.
    pub fn put(&self, key: K, value: V) -> Option<(K, V)> {
        let mut inner = self.lock();

        if let Some(idx) = inner.map.get(&key).copied() {
            inner.slots[idx].value = value;
            inner.promote(idx);
            return None;
        }

        if inner.slots.len() < inner.capacity {
            let idx = inner.slots.len();
            inner.slots.push(Slot {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            inner.push_front(idx);
            inner.map.insert(key, idx);
            return None;
        }

        // Full: reuse the tail slot for the new entry.
        let idx = inner.tail?;
        inner.unlink(idx);
        let old_key = std::mem::replace(&mut inner.slots[idx].key, key.clone());
        let old_value = std::mem::replace(&mut inner.slots[idx].value, value);
        inner.map.remove(&old_key);
        inner.map.insert(key, idx);
        inner.push_front(idx);
        inner.stats.evictions += 1;

        Some((old_key, old_value))
    }

    /// Returns whether `key` is cached, without touching recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().map.contains_key(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Drops every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.slots.clear();
        inner.head = None;
        inner.tail = None;
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        let inner = self.lock();
        let mut keys = Vec::with_capacity(inner.map.len());
        let mut cursor = inner.head;
        while let Some(idx) = cursor {
            keys.push(inner.slots[idx].key.clone());
            cursor = inner.slots[idx].next;
        }
        keys
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Ok(inner) => f
                .debug_struct("LruCache")
                .field("len", &inner.map.len())
                .field("capacity", &inner.capacity)
                .field("stats", &inner.stats)
                .finish(),
            Err(_) => f.debug_struct("LruCache").finish_non_exhaustive(),
        }
    }
}
