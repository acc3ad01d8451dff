//! Cache Module
//!
//! Bounded key-value storage with TTL expiration and LRU eviction, the
//! backing store of the memoization layer.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::StoreEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{BoundedStore, Sizer, StoreOptions};

// == Public Constants ==
/// Entry bound applied when neither a count nor a size bound is configured
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
