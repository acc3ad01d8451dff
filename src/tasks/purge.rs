//! Stale Purge Task
//!
//! Background task that periodically removes expired entries from a cache.
//! Expired entries already read as misses; the sweep only returns their memory
//! (and the results they hold) before a lookup would.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::memoize::SingleFlightCache;

/// Spawns a task that calls [`SingleFlightCache::purge_stale`] every `interval`.
///
/// The task holds only a weak reference, so it ends on its own once the
/// cache is dropped. It can also be stopped early through the returned handle.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(SingleFlightCache::new(CacheOptions::new().ttl(ttl))?);
/// let purge_handle = spawn_purge_task(&cache, Duration::from_secs(1));
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task<K, V, E>(
    cache: &Arc<SingleFlightCache<K, V, E>>,
    interval: Duration,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let cache = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting stale purge task");

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("cache dropped, stopping stale purge task");
                break;
            };

            let removed = cache.purge_stale();
            if removed > 0 {
                info!(removed, "purged expired entries");
            } else {
                debug!("purge: no expired entries found");
            }
        }
    })
}
