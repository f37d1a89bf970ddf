//! Store Module
//!
//! Three storage strategies behind one capability interface:
//!
//! - [`LruCache`]: the core. Fixed capacity, least-recently-accessed
//!   eviction, TTL expiry, one mutual-exclusion lock.
//! - [`BoundedCache`]: fixed capacity, rejects inserts when full instead
//!   of evicting; reader/writer lock, since reads mutate nothing.
//! - [`UnboundedCache`]: no capacity bound, TTL-only expiry over a
//!   sharded concurrent map.
//!
//! Eviction policy and concurrency strategy are a construction-time
//! choice; afterwards every variant is driven through [`Cache`].

mod bounded;
mod entry;
mod evicting;
mod reaper;
mod recency;
mod stats;
mod unbounded;


// Re-export public types
pub use bounded::BoundedCache;
pub use entry::EntrySnapshot;
pub use evicting::LruCache;
pub use reaper::{Deferred, Scheduler, TokioScheduler};
pub use stats::CacheStats;
pub use unbounded::UnboundedCache;

use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

// == Cache Trait ==
/// The capability interface every storage strategy offers.
///
/// `set` carries a `Result` because the rejecting variant can fail on a
/// full store; the evicting and unbounded variants never return an error
/// from it.
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Stores `value` under `key`, expiring after `ttl`.
    fn set(&self, key: String, value: V, ttl: Duration) -> Result<()>;

    /// Retrieves the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Option<V>;

    /// Removes the entry under `key`; a no-op if absent.
    fn delete(&self, key: &str);

    /// Returns a point-in-time copy of every live entry.
    fn list(&self) -> HashMap<String, EntrySnapshot<V>>;

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Returns true if the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
