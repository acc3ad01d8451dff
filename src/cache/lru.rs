//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for store eviction.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every touch hands the key a fresh, strictly increasing stamp:
/// - Smallest stamp = Least recently used
/// - Largest stamp = Most recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys ordered by access stamp
    order: BTreeMap<u64, K>,
    /// Current stamp of each tracked key
    stamps: HashMap<K, u64>,
    /// Next stamp to hand out
    next_stamp: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            order: BTreeMap::new(),
            stamps: HashMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, tracking it if it was unknown.
    pub fn touch(&mut self, key: &K) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        if let Some(old) = self.stamps.insert(key.clone(), stamp) {
            self.order.remove(&old);
        }
        self.order.insert(stamp, key.clone());
    }

    // == Remove ==
    /// Stops tracking a key. Unknown keys are ignored.
    pub fn remove(&mut self, key: &K) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    #[cfg(test)]
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.values().next()
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }

    // == Clear ==
    /// Forgets every key. Stamps keep increasing across clears.
    pub fn clear(&mut self) {
        self.order.clear();
        self.stamps.clear();
    }
}
