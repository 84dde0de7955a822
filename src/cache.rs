//! Bounded LRU caches.
//!
//! Every cache is a `parking_lot::Mutex<lru::LruCache>` keyed by an explicit
//! key struct built from normalized request parameters. Values are computed
//! outside the lock, so two threads missing the same key may both compute
//! it; the second insert simply replaces the first.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::format::KgtkObjectCollection;
use crate::model::{ItemDocument, SearchResponse};
use crate::Result;

// ============================================================================
// LruMap
// ============================================================================

/// A thread-safe bounded map with least-recently-used eviction.
pub struct LruMap<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> LruMap<K, V> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.inner.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().put(key, value);
    }

    /// Return the cached value or compute, store and return it. Errors are
    /// not cached.
    pub fn get_or_try_insert<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: self.len(),
        }
    }
}

/// Hit/miss counters for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

// ============================================================================
// Response cache keys
// ============================================================================

/// Key for `get_all_node_data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeDataKey {
    pub node: String,
    pub lang: String,
    pub images: bool,
    pub fanouts: bool,
    pub inverse: bool,
    pub formatter: &'static str,
}

/// Key for the item and related-items documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub node: String,
    pub lang: String,
    pub related: bool,
    pub proplist_max_len: usize,
    pub valuelist_max_len: usize,
    pub qual_proplist_max_len: usize,
    pub qual_valuelist_max_len: usize,
    pub query_limit: usize,
    pub qual_query_limit: usize,
}

/// Key for `/kb/query`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub q: String,
    pub lang: String,
    pub flags: [bool; 5],
    pub item_prefix_limit: usize,
    pub label_prefix_limit: usize,
}

/// The caches in front of the top-level operations.
pub struct ResponseCaches {
    pub node_data: LruMap<NodeDataKey, Option<Arc<KgtkObjectCollection>>>,
    pub items: LruMap<ItemKey, Arc<ItemDocument>>,
    pub search: LruMap<SearchKey, Arc<SearchResponse>>,
}

impl ResponseCaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            node_data: LruMap::new(capacity),
            items: LruMap::new(capacity),
            search: LruMap::new(capacity),
        }
    }

    pub fn clear(&self) {
        self.node_data.clear();
        self.items.clear();
        self.search.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_evicts_least_recently_used() {
        let cache: LruMap<&str, u32> = LruMap::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let cache: LruMap<u8, u8> = LruMap::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_get_or_try_insert_computes_once() {
        let cache: LruMap<u8, u8> = LruMap::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert(1, || {
                    calls += 1;
                    Ok(7)
                })
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: LruMap<u8, u8> = LruMap::new(4);
        let r = cache.get_or_try_insert(1, || Err(Error::QueryEngine("down".into())));
        assert!(r.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_distinguish_flags() {
        let cache: LruMap<NodeDataKey, u8> = LruMap::new(4);
        let key = |inverse| NodeDataKey {
            node: "Q1".into(),
            lang: "en".into(),
            images: false,
            fanouts: false,
            inverse,
            formatter: "json-triple",
        };
        cache.insert(key(false), 1);
        cache.insert(key(true), 2);
        assert_eq!(cache.get(&key(false)), Some(1));
        assert_eq!(cache.get(&key(true)), Some(2));
    }
}
