//! LRU Memoize - Single-flight memoization of async operations
//!
//! Caches the outcome of async producers behind a bounded store with TTL
//! expiration and LRU eviction. Concurrent requests for the same key share one
//! in-flight execution.

pub mod cache;
pub mod config;
pub mod error;
pub mod memoize;
pub mod tasks;

pub use cache::CacheStats;
pub use config::{CacheOptions, MemoizeOptions};
pub use error::{CacheError, Result};
pub use memoize::SingleFlightCache;
pub use tasks::spawn_purge_task;
