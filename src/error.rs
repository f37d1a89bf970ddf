//! Error types for the cache library
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for all cache variants.
///
/// Construction faults (`InvalidCapacity`, `SchedulerUnavailable`) are
/// reported when a cache is built and never occur afterwards. The only
/// runtime error is `CapacityExceeded`, and only the rejecting
/// [`BoundedCache`](crate::store::BoundedCache) produces it; the evicting
/// cache makes room instead of failing.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache was constructed with a capacity of zero
    #[error("invalid capacity {0}: capacity must be at least 1")]
    InvalidCapacity(usize),

    /// Cache is full and the variant does not evict
    #[error("cache is full: capacity of {capacity} entries reached")]
    CapacityExceeded {
        /// The configured capacity that was hit
        capacity: usize,
    },

    /// No timer facility was available to schedule TTL expirations
    #[error("no scheduler available: construct the cache inside a tokio runtime or supply a scheduler explicitly")]
    SchedulerUnavailable,
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_fault() {
        let err = CacheError::InvalidCapacity(0);
        assert!(err.to_string().contains("capacity"));

        let err = CacheError::CapacityExceeded { capacity: 8 };
        assert!(err.to_string().contains('8'));

        let err = CacheError::SchedulerUnavailable;
        assert!(err.to_string().contains("scheduler"));
    }
}
