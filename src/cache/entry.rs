//! Store Entry Module
//!
//! Defines the structure for individual store entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Store Entry ==
/// Represents a single stored value with its size and expiration metadata.
///
/// Time is read from `tokio::time::Instant`, so a paused tokio clock drives
/// expiration in tests.
#[derive(Debug, Clone)]
pub struct StoreEntry<T> {
    /// The stored value
    pub value: T,
    /// Size charged against the store's `max_size` bound
    pub size: u64,
    /// Start of the current TTL window (insertion, or last read when ages are refreshed)
    pub refreshed_at: Instant,
    /// Time-to-live, None = no expiration
    pub ttl: Option<Duration>,
}

impl<T> StoreEntry<T> {
    // == Constructor ==
    /// Creates a new entry whose TTL window starts now.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `size` - The size computed for the value
    /// * `ttl` - Optional time-to-live
    pub fn new(value: T, size: u64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            size,
            refreshed_at: Instant::now(),
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired only once the current time is
    /// strictly past the end of its TTL window; at the boundary it is still live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at() {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// End of the current TTL window.
    ///
    /// None if no expiration is set, or if the window ends beyond what an
    /// `Instant` can represent, which reads as never expiring.
    pub fn expires_at(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| self.refreshed_at.checked_add(ttl))
    }

    // == Refresh ==
    /// Restarts the TTL window from now (sliding expiration).
    pub fn refresh(&mut self) {
        self.refreshed_at = Instant::now();
    }
}
