//! Single-Flight Cache
//!
//! Memoizes async producers per key on top of a [`BoundedStore`]. Concurrent
//! callers of the same key share one producer execution and observe the same
//! outcome.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{BoundedStore, CacheStats, Sizer};
use crate::config::{CacheOptions, MemoizeOptions};
use crate::error::Result;
use crate::memoize::{MemoEntry, SharedResult, Token};

// == Single-Flight Cache ==
/// Bounded, time-aware memoization of async operations.
///
/// On a miss the producer is invoked and its future is stored before anyone
/// awaits it, so every concurrent caller of the same key joins that one
/// execution. Successful outcomes stay cached until they expire or are
/// evicted; failures are removed as soon as they settle and are never
/// retried by the cache itself.
///
/// The store lock is held only for lookups and mutations, never across an
/// `.await`.
pub struct SingleFlightCache<K, V, E> {
    store: Mutex<BoundedStore<K, MemoEntry<V, E>>>,
    next_token: AtomicU64,
    options: CacheOptions,
    sized: bool,
}

/// Outcome of the locked lookup at the start of `memoize_with`.
struct Flight<V, E> {
    future: SharedResult<V, E>,
    token: Token,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache from its options.
    ///
    /// Fails if the options are invalid, for example when the removed
    /// `max_age` option is set or `max_size` is set without a size calculation.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Self::build(options, None)
    }

    /// Creates a cache whose entries are weighed by `size_calculation`.
    ///
    /// The calculation receives `None` while the producer is still pending and
    /// the value once it has succeeded; the entry is re-weighed at that point.
    pub fn with_size_calculation<F>(options: CacheOptions, size_calculation: F) -> Result<Self>
    where
        F: Fn(Option<&V>, &K) -> u64 + Send + Sync + 'static,
    {
        let sizer: Sizer<K, MemoEntry<V, E>> =
            Arc::new(move |entry: &MemoEntry<V, E>, key: &K| size_calculation(entry.settled_value(), key));
        Self::build(options, Some(sizer))
    }

    fn build(options: CacheOptions, sizer: Option<Sizer<K, MemoEntry<V, E>>>) -> Result<Self> {
        let sized = sizer.is_some();
        let store_options = options.validate(sized)?;

        info!(
            max_entries = ?store_options.max_entries,
            max_size = ?store_options.max_size,
            ttl_ms = ?store_options.ttl.map(|ttl| ttl.as_millis()),
            update_age_on_get = store_options.update_age_on_get,
            dispose_on_settle = options.dispose_on_settle,
            "memoization cache created"
        );

        Ok(Self {
            store: Mutex::new(BoundedStore::new(store_options, sizer)),
            next_token: AtomicU64::new(0),
            options,
            sized,
        })
    }

    // == Memoize ==
    /// Returns the memoized outcome for `key`, invoking `producer` on a miss.
    ///
    /// See [`memoize_with`](Self::memoize_with).
    pub async fn memoize<F, Fut>(&self, key: K, producer: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        self.memoize_with(key, producer, MemoizeOptions::default())
            .await
    }

    /// Returns the memoized outcome for `key`, invoking `producer` on a miss.
    ///
    /// A hit joins the stored future, pending or settled, without invoking
    /// `producer`. A miss invokes it, stores its future with the TTL from
    /// `options` (or the configured default) and then awaits it. The
    /// producer's error is returned as is to every caller sharing the future.
    ///
    /// `producer` is called while the store lock is held. It must only build
    /// its future; re-entering this cache synchronously from it deadlocks.
    pub async fn memoize_with<F, Fut>(
        &self,
        key: K,
        producer: F,
        options: MemoizeOptions,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let flight = self.join_or_start(&key, producer, &options);
        let outcome = flight.future.await;
        self.settle(&key, flight.token, outcome.is_ok());
        outcome
    }

    fn join_or_start<F, Fut>(&self, key: &K, producer: F, options: &MemoizeOptions) -> Flight<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let mut store = self.store.lock();

        if let Some(entry) = store.get(key) {
            debug!(token = entry.token.0, "memoize hit");
            return Flight {
                future: entry.future.clone(),
                token: entry.token,
            };
        }

        // Miss: the entry must be in the store before anyone awaits it
        let future = producer().boxed().shared();
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        let entry = MemoEntry {
            future: future.clone(),
            token,
        };

        if store.set(key.clone(), entry, options.ttl) {
            debug!(token = token.0, ttl_ms = ?options.ttl.map(|ttl| ttl.as_millis()), "memoize miss, producer started");
        } else {
            warn!(token = token.0, "memoize miss, producer started without a cache entry");
        }

        Flight { future, token }
    }

    /// Reconciles the store with a settled outcome.
    ///
    /// Every caller runs this, so the entry is cleaned up even when the
    /// leader was dropped mid-await. The token check makes it idempotent, and
    /// re-weighing a settled value yields the same size every time.
    fn settle(&self, key: &K, token: Token, succeeded: bool) {
        if !succeeded {
            if self.remove_if_current(key, token) {
                debug!(token = token.0, "producer failed, entry removed");
            }
            return;
        }

        if self.options.dispose_on_settle {
            if self.remove_if_current(key, token) {
                debug!(token = token.0, "producer settled, entry disposed");
            }
            return;
        }

        if self.sized {
            let mut store = self.store.lock();
            if Self::is_current(&store, key, token) && !store.resize(key) {
                debug!(token = token.0, "settled entry evicted after resize");
            }
        }
    }

    fn remove_if_current(&self, key: &K, token: Token) -> bool {
        let mut store = self.store.lock();
        Self::is_current(&store, key, token) && store.delete(key)
    }

    fn is_current(store: &BoundedStore<K, MemoEntry<V, E>>, key: &K, token: Token) -> bool {
        store.peek(key).is_some_and(|entry| entry.token == token)
    }

    // == Delete ==
    /// Removes the entry for `key`.
    ///
    /// Returns true iff a live entry was removed. A producer still running for
    /// that key keeps running; its callers still receive its outcome.
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.store.lock().delete(key);
        debug!(removed, "delete");
        removed
    }

    /// Whether a live entry exists for `key`. Does not affect recency or age.
    pub fn contains(&self, key: &K) -> bool {
        self.store.lock().peek(key).is_some()
    }

    /// Number of stored entries, expired ones included until they are dropped.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    // == Purge Stale ==
    /// Drops every expired entry, returning how many were removed.
    pub fn purge_stale(&self) -> usize {
        self.store.lock().purge_stale()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }
}

impl<K, V, E> fmt::Debug for SingleFlightCache<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlightCache")
            .field("options", &self.options)
            .field("next_token", &self.next_token.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
