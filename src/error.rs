//! Error types for the memoization cache
//!
//! Provides unified configuration error handling using thiserror. Producer
//! failures are never represented here: they reach callers as the producer's
//! own error type, untouched.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised while building a cache from its options.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An option that has been removed or renamed was supplied
    #[error("\"{option}\" is no longer supported; use \"{replacement}\" instead")]
    UnsupportedOption {
        option: &'static str,
        replacement: &'static str,
    },

    /// `max_size` was set without a size calculation
    #[error("a size calculation is required when \"max_size\" is set")]
    MissingSizeCalculation,

    /// Any other invalid option value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
