//! Memstash - An embeddable in-memory key-value cache
//!
//! Provides string-keyed storage of arbitrary values with per-entry TTL
//! expiry, offered in three interchangeable strategies: a bounded cache
//! with least-recently-accessed eviction (the default choice), a bounded
//! cache that rejects inserts when full, and an unbounded concurrent map.
//!
//! # Example
//!
//! ```
//! use memstash::LruCache;
//! use std::time::Duration;
//!
//! tokio_test::block_on(async {
//!     let cache = LruCache::new(2).unwrap();
//!
//!     cache.set("alpha", 1, Duration::from_secs(60));
//!     cache.set("beta", 2, Duration::from_secs(60));
//!     assert_eq!(cache.get("alpha"), Some(1));
//!
//!     // "beta" is now the least recently accessed entry and makes way.
//!     cache.set("gamma", 3, Duration::from_secs(60));
//!     assert_eq!(cache.get("beta"), None);
//!     assert_eq!(cache.len(), 2);
//! });
//! ```

pub mod config;
pub mod error;
pub mod store;

pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use store::{
    BoundedCache, Cache, CacheStats, Deferred, EntrySnapshot, LruCache, Scheduler,
    TokioScheduler, UnboundedCache,
};
