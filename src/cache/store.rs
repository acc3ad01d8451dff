//! Bounded Store Module
//!
//! Key-value engine combining HashMap storage with LRU tracking, TTL expiration
//! and an optional aggregate size bound.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheStats, LruTracker, StoreEntry};

/// Computes the size charged for a stored value.
pub type Sizer<K, T> = Arc<dyn Fn(&T, &K) -> u64 + Send + Sync>;

// == Store Options ==
/// Bounds and expiration policy of a [`BoundedStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Maximum number of entries, None = no count bound
    pub max_entries: Option<usize>,
    /// Maximum aggregate size, None = no size bound
    pub max_size: Option<u64>,
    /// TTL applied when `set` is given none
    pub ttl: Option<Duration>,
    /// Restart an entry's TTL window on every successful `get`
    pub update_age_on_get: bool,
}

// == Bounded Store ==
/// Capacity and TTL enforcing key-value store.
///
/// Expired entries are removed lazily on access, or in bulk by
/// [`purge_stale`](Self::purge_stale). When a bound would be exceeded the
/// least recently used entries are evicted.
pub struct BoundedStore<K, T> {
    /// Key-value storage
    entries: HashMap<K, StoreEntry<T>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    options: StoreOptions,
    sizer: Option<Sizer<K, T>>,
    /// Sum of all entry sizes
    total_size: u64,
}

impl<K, T> fmt::Debug for BoundedStore<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStore")
            .field("entries", &self.entries.len())
            .field("total_size", &self.total_size)
            .field("options", &self.options)
            .field("sized", &self.sizer.is_some())
            .finish_non_exhaustive()
    }
}

impl<K: Eq + Hash + Clone, T> BoundedStore<K, T> {
    // == Constructor ==
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `options` - Bounds and expiration policy
    /// * `sizer` - Optional size calculation; entries weigh 0 without one
    pub fn new(options: StoreOptions, sizer: Option<Sizer<K, T>>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            options,
            sizer,
            total_size: 0,
        }
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed and counted as misses. A hit marks the key
    /// as most recently used and, with `update_age_on_get`, restarts its TTL
    /// window.
    pub fn get(&mut self, key: &K) -> Option<&T> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(Instant::now()),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!(entries = self.entries.len(), "dropped expired entry on read");
            return None;
        }

        self.stats.record_hit();
        self.lru.touch(key);

        let update_age = self.options.update_age_on_get;
        let entry = self.entries.get_mut(key)?;
        if update_age {
            entry.refresh();
        }
        Some(&entry.value)
    }

    // == Peek ==
    /// Retrieves a live value without touching recency, age or statistics.
    pub fn peek(&self, key: &K) -> Option<&T> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| &entry.value)
    }

    // == Set ==
    /// Stores a value, replacing any previous entry for the key.
    ///
    /// If the entry alone exceeds `max_size` it is not stored, and the
    /// previous entry for the key is dropped as well. Otherwise least recently
    /// used entries are evicted until both bounds hold.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses the store default if None, a zero TTL never expires)
    ///
    /// # Returns
    /// Whether the value was stored.
    pub fn set(&mut self, key: K, value: T, ttl: Option<Duration>) -> bool {
        let size = self.size_of(&value, &key);

        // Overwrite case: account for the old entry before inserting
        self.remove_entry(&key);

        if let Some(max_size) = self.options.max_size {
            if size > max_size {
                warn!(size, max_size, "entry exceeds the store size bound, not stored");
                return false;
            }
        }

        let ttl = match ttl {
            Some(ttl) if ttl.is_zero() => None,
            Some(ttl) => Some(ttl),
            None => self.options.ttl,
        };
        self.entries
            .insert(key.clone(), StoreEntry::new(value, size, ttl));
        self.total_size += size;
        self.lru.touch(&key);

        self.enforce_bounds();
        true
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns true only if a live entry was removed. An expired entry is
    /// dropped as well but reported as absent.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.remove_entry(key) {
            Some(entry) if entry.is_expired() => {
                self.stats.record_expirations(1);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Resize ==
    /// Recomputes the size of a stored entry and re-enforces the bounds.
    ///
    /// Returns whether the entry is still stored afterwards.
    pub fn resize(&mut self, key: &K) -> bool {
        let Some(sizer) = self.sizer.clone() else {
            return self.entries.contains_key(key);
        };
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        let size = sizer(&entry.value, key);
        self.total_size = self.total_size - entry.size + size;
        entry.size = size;

        if let Some(max_size) = self.options.max_size {
            if size > max_size {
                warn!(size, max_size, "resized entry exceeds the store size bound, removed");
                self.remove_entry(key);
                return false;
            }
        }

        self.enforce_bounds();
        self.entries.contains_key(key)
    }

    // == Purge Stale ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Clear ==
    /// Removes every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.total_size = 0;
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_size: self.total_size,
            ..self.stats.clone()
        }
    }

    /// Returns the number of stored entries, expired ones included until they are dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn size_of(&self, value: &T, key: &K) -> u64 {
        self.sizer.as_ref().map_or(0, |sizer| sizer(value, key))
    }

    fn remove_entry(&mut self, key: &K) -> Option<StoreEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_size -= entry.size;
        Some(entry)
    }

    fn over_capacity(&self) -> bool {
        let too_many = self
            .options
            .max_entries
            .is_some_and(|max| self.entries.len() > max);
        let too_big = self
            .options
            .max_size
            .is_some_and(|max| self.total_size > max);
        too_many || too_big
    }

    fn enforce_bounds(&mut self) {
        while self.over_capacity() {
            let Some(evicted) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&evicted) {
                self.total_size -= entry.size;
                self.stats.record_eviction();
                debug!(
                    size = entry.size,
                    entries = self.entries.len(),
                    "evicted least recently used entry"
                );
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn counted(max_entries: usize) -> BoundedStore<String, String> {
        BoundedStore::new(
            StoreOptions {
                max_entries: Some(max_entries),
                ..Default::default()
            },
            None,
        )
    }

    fn sized(max_size: u64) -> BoundedStore<String, String> {
        let sizer: Sizer<String, String> = Arc::new(|value: &String, _key: &String| value.len() as u64);
        BoundedStore::new(
            StoreOptions {
                max_size: Some(max_size),
                ..Default::default()
            },
            Some(sizer),
        )
    }

    fn set(store: &mut BoundedStore<String, String>, key: &str, value: &str) -> bool {
        store.set(key.to_string(), value.to_string(), None)
    }

    fn get(store: &mut BoundedStore<String, String>, key: &str) -> Option<String> {
        store.get(&key.to_string()).cloned()
    }

    #[test]
    fn test_store_new() {
        let store = counted(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = counted(100);

        assert!(set(&mut store, "key1", "value1"));
        assert_eq!(get(&mut store, "key1").as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = counted(100);
        assert_eq!(get(&mut store, "nonexistent"), None);
    }

    #[test]
    fn test_store_delete() {
        let mut store = counted(100);

        set(&mut store, "key1", "value1");
        assert!(store.delete(&"key1".to_string()));
        assert!(!store.delete(&"key1".to_string()));

        assert!(store.is_empty());
        assert_eq!(get(&mut store, "key1"), None);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = counted(100);

        set(&mut store, "key1", "value1");
        set(&mut store, "key1", "value2");

        assert_eq!(get(&mut store, "key1").as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = counted(3);

        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        set(&mut store, "key3", "value3");

        // Store is full, adding key4 should evict key1 (oldest)
        set(&mut store, "key4", "value4");

        assert_eq!(store.len(), 3);
        assert_eq!(get(&mut store, "key1"), None);
        assert!(get(&mut store, "key2").is_some());
        assert!(get(&mut store, "key4").is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = counted(3);

        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        set(&mut store, "key3", "value3");

        // Access key1 to make it most recently used
        get(&mut store, "key1");

        // Adding key4 should evict key2 (now oldest)
        set(&mut store, "key4", "value4");

        assert!(get(&mut store, "key1").is_some());
        assert_eq!(get(&mut store, "key2"), None);
    }

    #[test]
    fn test_store_peek_does_not_touch() {
        let mut store = counted(2);

        set(&mut store, "key1", "value1");
        set(&mut store, "key2", "value2");
        assert!(store.peek(&"key1".to_string()).is_some());

        set(&mut store, "key3", "value3");

        assert_eq!(get(&mut store, "key1"), None);
        assert_eq!(store.stats().hits, 0);
    }

    #[test]
    fn test_store_size_bound_evicts() {
        let mut store = sized(10);

        set(&mut store, "a", "1234");
        set(&mut store, "b", "1234");
        assert_eq!(store.total_size(), 8);

        set(&mut store, "c", "1234");

        assert_eq!(store.total_size(), 8);
        assert_eq!(get(&mut store, "a"), None);
        assert!(get(&mut store, "c").is_some());
    }

    #[test]
    fn test_store_oversized_entry_rejected() {
        let mut store = sized(4);

        assert!(set(&mut store, "key", "abc"));
        assert!(!set(&mut store, "key", "abcdef"));

        // The previous entry for the key is gone too
        assert_eq!(get(&mut store, "key"), None);
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_store_resize() {
        let cell = Arc::new(parking_lot::Mutex::new(1u64));
        let weight = Arc::clone(&cell);
        let sizer: Sizer<String, String> = Arc::new(move |_: &String, _: &String| *weight.lock());
        let mut store = BoundedStore::new(
            StoreOptions {
                max_size: Some(10),
                ..Default::default()
            },
            Some(sizer),
        );

        set(&mut store, "key", "value");
        assert_eq!(store.total_size(), 1);

        *cell.lock() = 6;
        assert!(store.resize(&"key".to_string()));
        assert_eq!(store.total_size(), 6);

        *cell.lock() = 11;
        assert!(!store.resize(&"key".to_string()));
        assert!(store.is_empty());
        assert_eq!(store.total_size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = counted(100);

        store.set("key1".to_string(), "value1".to_string(), Some(Duration::from_secs(1)));
        assert!(get(&mut store, "key1").is_some());

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(get(&mut store, "key1"), None);
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_default_ttl() {
        let mut store: BoundedStore<String, String> = BoundedStore::new(
            StoreOptions {
                max_entries: Some(10),
                ttl: Some(Duration::from_millis(200)),
                ..Default::default()
            },
            None,
        );

        set(&mut store, "key1", "value1");
        store.set("key2".to_string(), "value2".to_string(), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_millis(250)).await;

        assert_eq!(get(&mut store, "key1"), None);
        assert!(get(&mut store, "key2").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_zero_ttl_never_expires() {
        let mut store: BoundedStore<String, String> = BoundedStore::new(
            StoreOptions {
                max_entries: Some(10),
                ttl: Some(Duration::from_millis(200)),
                ..Default::default()
            },
            None,
        );

        // A zero TTL overrides the store default instead of expiring on insert
        store.set("key1".to_string(), "value1".to_string(), Some(Duration::ZERO));
        assert!(get(&mut store, "key1").is_some());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(get(&mut store, "key1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_huge_ttl_does_not_overflow() {
        let mut store = counted(10);

        store.set("key1".to_string(), "value1".to_string(), Some(Duration::MAX));

        assert!(get(&mut store, "key1").is_some());
        assert!(store.peek(&"key1".to_string()).is_some());
        assert_eq!(store.purge_stale(), 0);
        assert!(store.delete(&"key1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_update_age_on_get() {
        let mut store: BoundedStore<String, String> = BoundedStore::new(
            StoreOptions {
                max_entries: Some(10),
                ttl: Some(Duration::from_millis(100)),
                update_age_on_get: true,
                ..Default::default()
            },
            None,
        );

        set(&mut store, "key1", "value1");
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(60)).await;
            assert!(get(&mut store, "key1").is_some());
        }

        tokio::time::advance(Duration::from_millis(101)).await;
        assert_eq!(get(&mut store, "key1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_delete_expired_reports_absent() {
        let mut store = counted(100);

        store.set("key1".to_string(), "value1".to_string(), Some(Duration::from_millis(10)));
        tokio::time::advance(Duration::from_millis(20)).await;

        assert!(!store.delete(&"key1".to_string()));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_stale() {
        let mut store = counted(100);

        store.set("key1".to_string(), "value1".to_string(), Some(Duration::from_secs(1)));
        store.set("key2".to_string(), "value2".to_string(), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.purge_stale(), 1);
        assert_eq!(store.len(), 1);
        assert!(get(&mut store, "key2").is_some());
    }

    #[test]
    fn test_store_clear_keeps_counters() {
        let mut store = counted(100);

        set(&mut store, "key1", "value1");
        get(&mut store, "key1");
        store.clear();

        let stats = store.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hits, 1);
    }
}
