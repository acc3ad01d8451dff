//! LRU Memoize demo
//!
//! Fires bursts of concurrent lookups at a slow producer and reports how many
//! producer runs the cache let through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lru_memoize::{spawn_purge_task, CacheOptions, SingleFlightCache};

/// Concurrent callers per key in each burst
const CALLERS_PER_KEY: usize = 8;
/// Distinct keys requested in each burst
const KEYS: usize = 4;
/// Simulated producer latency
const PRODUCER_LATENCY: Duration = Duration::from_millis(100);

/// Entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache options from environment variables
/// 3. Create the cache and its stale purge task
/// 4. Run two bursts of concurrent lookups and log the statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lru_memoize=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut options = CacheOptions::from_env().context("loading cache options")?;
    if options.ttl.is_none() {
        options.ttl = Some(Duration::from_secs(30));
    }
    info!(?options, "Configuration loaded");

    let cache: Arc<SingleFlightCache<String, String, String>> =
        Arc::new(SingleFlightCache::new(options).context("building cache")?);
    let purge_handle = spawn_purge_task(&cache, Duration::from_secs(1));
    let producer_runs = Arc::new(AtomicUsize::new(0));

    for burst in 1..=2 {
        let mut handles = Vec::with_capacity(KEYS * CALLERS_PER_KEY);

        for caller in 0..KEYS * CALLERS_PER_KEY {
            let cache = Arc::clone(&cache);
            let producer_runs = Arc::clone(&producer_runs);
            let key = format!("resource-{}", caller % KEYS);

            handles.push(tokio::spawn(async move {
                let lookup = key.clone();
                cache
                    .memoize(key, move || async move {
                        producer_runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(PRODUCER_LATENCY).await;
                        Ok(format!("{lookup} resolved"))
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.context("lookup task panicked")?.map_err(anyhow::Error::msg)?;
        }

        let stats = cache.stats();
        info!(
            burst,
            producer_runs = producer_runs.load(Ordering::SeqCst),
            hits = stats.hits,
            misses = stats.misses,
            hit_rate = stats.hit_rate(),
            entries = stats.total_entries,
            "burst complete"
        );
    }

    purge_handle.abort();
    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    Ok(())
}
