//! Background Tasks Module
//!
//! Contains optional background tasks tied to a cache instance.
//!
//! # Tasks
//! - Stale purge: Removes expired entries at a configured interval

mod purge;

pub use purge::spawn_purge_task;
