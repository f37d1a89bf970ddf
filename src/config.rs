//! Configuration Module
//!
//! Construction-time settings for the evicting cache.

use crate::error::{CacheError, Result};

/// Default maximum number of entries when none is specified.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Construction-time configuration for [`LruCache`](crate::store::LruCache).
///
/// Whether `list` refreshes recency for every entry it returns is a policy
/// choice: the behavior couples inspection with recency bookkeeping, which
/// callers may rely on for cache warming or may not want at all. It is
/// therefore configurable rather than hard-coded, with the default
/// preserving the touching behavior.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Whether `list` refreshes `last_accessed_at` for every returned entry
    pub touch_on_list: bool,
}

impl CacheConfig {
    /// Creates a configuration with the given capacity and touching `list`
    /// semantics.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            touch_on_list: true,
        }
    }

    /// Sets whether `list` refreshes recency for the entries it returns.
    #[must_use]
    pub fn touch_on_list(mut self, touch: bool) -> Self {
        self.touch_on_list = touch;
        self
    }

    /// Checks the configuration for faults.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] if `capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(config.touch_on_list);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_zero_capacity_is_rejected() {
        let config = CacheConfig::new(0);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_config_touch_on_list_toggle() {
        let config = CacheConfig::new(10).touch_on_list(false);
        assert_eq!(config.capacity, 10);
        assert!(!config.touch_on_list);
    }
}
