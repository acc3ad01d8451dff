//! Memoization Module
//!
//! Single-flight memoization of async producers on top of the bounded store.

mod cache;
mod entry;

pub use cache::SingleFlightCache;
pub use entry::{MemoEntry, SharedResult, Token};
