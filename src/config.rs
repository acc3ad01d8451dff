//! Configuration Module
//!
//! Cache construction options, their validation, and loading them from
//! environment variables or JSON.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::cache::{StoreOptions, DEFAULT_MAX_ENTRIES};
use crate::error::{CacheError, Result};

/// Construction options of a [`SingleFlightCache`](crate::SingleFlightCache).
///
/// Durations deserialize from milliseconds (`ttl_ms`, `max_age_ms`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheOptions {
    /// Maximum number of entries
    pub max_entries: Option<usize>,
    /// Maximum aggregate size, requires a size calculation
    pub max_size: Option<u64>,
    /// Default time-to-live of every entry, zero = no expiration
    #[serde(rename = "ttl_ms", deserialize_with = "millis")]
    pub ttl: Option<Duration>,
    /// Restart an entry's TTL window whenever it is read
    pub update_age_on_get: bool,
    /// Drop an entry as soon as its producer succeeds
    pub dispose_on_settle: bool,
    /// No longer supported; set `ttl` instead. Construction fails when this is set.
    #[serde(rename = "max_age_ms", deserialize_with = "millis")]
    pub max_age: Option<Duration>,
}

impl CacheOptions {
    /// Creates options with no bounds set; `max_entries` falls back to 1000 at construction.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn update_age_on_get(mut self, enabled: bool) -> Self {
        self.update_age_on_get = enabled;
        self
    }

    pub fn dispose_on_settle(mut self, enabled: bool) -> Self {
        self.dispose_on_settle = enabled;
        self
    }

    /// Loads options from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_MAX_ENTRIES` - Maximum entries (default: 1000 when no bound is set)
    /// - `MEMO_MAX_SIZE` - Maximum aggregate size
    /// - `MEMO_TTL_MS` - Default TTL in milliseconds
    /// - `MEMO_UPDATE_AGE_ON_GET` - Sliding expiration (default: false)
    /// - `MEMO_DISPOSE_ON_SETTLE` - Drop entries once settled (default: false)
    /// - `MEMO_MAX_AGE_MS` - Removed; kept only so construction can reject it
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_entries: env_var("MEMO_MAX_ENTRIES")?,
            max_size: env_var("MEMO_MAX_SIZE")?,
            ttl: env_var("MEMO_TTL_MS")?.map(Duration::from_millis),
            update_age_on_get: env_var("MEMO_UPDATE_AGE_ON_GET")?.unwrap_or(false),
            dispose_on_settle: env_var("MEMO_DISPOSE_ON_SETTLE")?.unwrap_or(false),
            max_age: env_var("MEMO_MAX_AGE_MS")?.map(Duration::from_millis),
        })
    }

    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CacheError::InvalidConfig(e.to_string()))
    }

    // == Validate ==
    /// Checks the options and resolves them into store options.
    ///
    /// `has_size_calculation` tells whether the caller attached a size calculation.
    pub(crate) fn validate(&self, has_size_calculation: bool) -> Result<StoreOptions> {
        if self.max_age.is_some() {
            return Err(CacheError::UnsupportedOption {
                option: "max_age",
                replacement: "ttl",
            });
        }
        if self.max_entries == Some(0) {
            return Err(CacheError::InvalidConfig(
                "\"max_entries\" must be a positive integer".to_string(),
            ));
        }
        if self.max_size == Some(0) {
            return Err(CacheError::InvalidConfig(
                "\"max_size\" must be a positive integer".to_string(),
            ));
        }
        if self.max_size.is_some() && !has_size_calculation {
            return Err(CacheError::MissingSizeCalculation);
        }

        // Always bounded: fall back to an entry count when no bound is given
        let max_entries = match (self.max_entries, self.max_size) {
            (None, None) => Some(DEFAULT_MAX_ENTRIES),
            (max_entries, _) => max_entries,
        };

        Ok(StoreOptions {
            max_entries,
            max_size: self.max_size,
            ttl: self.ttl.filter(|ttl| !ttl.is_zero()),
            update_age_on_get: self.update_age_on_get,
        })
    }
}

/// Per-call overrides accepted by [`memoize_with`](crate::SingleFlightCache::memoize_with).
///
/// Only `ttl` is honored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct MemoizeOptions {
    /// TTL of the entry created by this call, if it misses. Zero = no expiration
    pub ttl: Option<Duration>,
}

impl MemoizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::InvalidConfig(format!("{name} has an invalid value: {raw:?}"))),
        Err(_) => Ok(None),
    }
}

fn millis<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
