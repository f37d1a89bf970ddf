//! Unbounded Cache Module
//!
//! The no-bound sibling: no capacity, no eviction, TTL-only expiry. The
//! store is a sharded concurrent map, so operations on different keys do
//! not contend on a single lock the way the bounded variants do.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry as MapSlot;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::store::entry::{Entry, EntrySnapshot};
use crate::store::reaper::{Scheduler, TokioScheduler};
use crate::store::Cache;

// == Unbounded Cache ==
/// Unbounded in-memory cache with TTL expiry and no eviction.
///
/// Handles are cheap to clone and share one underlying store.
pub struct UnboundedCache<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    entries: DashMap<String, Entry<V>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<V> Clone for UnboundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> fmt::Debug for UnboundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundedCache")
            .field("len", &self.shared.entries.len())
            .finish_non_exhaustive()
    }
}

impl<V> UnboundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache scheduling TTL expirations on the current
    /// tokio runtime.
    ///
    /// # Errors
    /// [`CacheError::SchedulerUnavailable`](crate::CacheError::SchedulerUnavailable)
    /// when called outside a tokio runtime.
    pub fn new() -> Result<Self> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new()?);
        Ok(Self::with_scheduler(scheduler))
    }

    /// Creates an empty cache with an explicit scheduler.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: DashMap::new(),
                scheduler,
            }),
        }
    }

    // == Set ==
    /// Stores `value` under `key` with the given TTL. Never fails; there is
    /// no capacity to run out of.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut stale_reaper = None;

        let generation = match self.shared.entries.entry(key.clone()) {
            MapSlot::Occupied(mut occupied) => {
                let generation = occupied.get().generation + 1;
                let replaced = occupied.insert(Entry::new(value, now, ttl, generation));
                stale_reaper = replaced.reaper;
                generation
            }
            MapSlot::Vacant(vacant) => {
                vacant.insert(Entry::new(value, now, ttl, 1));
                1
            }
        };

        if let Some(reaper) = stale_reaper {
            reaper.cancel();
        }
        self.arm_reaper(key, ttl, generation);
    }

    // == Get ==
    /// Retrieves the value stored under `key`, or `None` if absent. An
    /// entry past its deadline reads as absent; removal stays with the
    /// reaper.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.shared.entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    // == Delete ==
    /// Removes the entry under `key` and cancels its pending expiry action.
    /// Deleting an absent key is a silent no-op.
    pub fn delete(&self, key: &str) {
        if let Some((_, entry)) = self.shared.entries.remove(key) {
            if let Some(reaper) = entry.reaper {
                reaper.cancel();
            }
            debug!(%key, "entry deleted");
        }
    }

    // == List ==
    /// Returns a point-in-time copy of every live entry. The copy is
    /// assembled shard by shard; entries past their deadline are omitted.
    pub fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        let now = Instant::now();
        self.shared
            .entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| {
                (
                    entry.key().clone(),
                    EntrySnapshot {
                        value: entry.value.clone(),
                        expires_at: entry.expires_at,
                        last_accessed_at: None,
                        generation: entry.generation,
                    },
                )
            })
            .collect()
    }

    // == Accessors ==
    /// Current number of entries, including any awaiting their reaper.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    // == Reaper Arming ==
    fn arm_reaper(&self, key: String, ttl: Duration, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        let reap_key = key.clone();
        let token = self.shared.scheduler.defer(
            ttl,
            Box::new(move || reap(weak, reap_key, generation)),
        );

        let mut token = Some(token);
        if let Some(mut entry) = self.shared.entries.get_mut(&key) {
            if entry.generation == generation {
                entry.reaper = token.take();
            }
        }
        if let Some(unused) = token {
            unused.cancel();
        }
    }
}

// == Reap ==
/// Removes `key` only while its generation still matches the one the
/// action was armed for; the check and the removal happen atomically under
/// the key's shard lock.
fn reap<V>(shared: Weak<Shared<V>>, key: String, generation: u64) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let removed = shared
        .entries
        .remove_if(&key, |_, entry| entry.generation == generation);
    if removed.is_some() {
        debug!(%key, generation, "ttl elapsed, entry reaped");
    } else {
        trace!(%key, generation, "stale reaper skipped");
    }
}

impl<V> Cache<V> for UnboundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Infallible for this variant; the trait signature carries the error
    /// for the rejecting sibling.
    fn set(&self, key: String, value: V, ttl: Duration) -> Result<()> {
        UnboundedCache::set(self, key, value, ttl);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        UnboundedCache::get(self, key)
    }

    fn delete(&self, key: &str) {
        UnboundedCache::delete(self, key);
    }

    fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        UnboundedCache::list(self)
    }

    fn len(&self) -> usize {
        UnboundedCache::len(self)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let cache = UnboundedCache::new().unwrap();
        cache.set("key1", "value1".to_string(), TTL);

        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[tokio::test]
    async fn test_no_capacity_bound() {
        let cache = UnboundedCache::new().unwrap();
        for i in 0..1000 {
            cache.set(format!("key{i}"), i, TTL);
        }
        assert_eq!(cache.len(), 1000);
    }

    #[tokio::test]
    async fn test_reaper_removes_entry_after_ttl() {
        let cache = UnboundedCache::new().unwrap();
        cache.set("short", 1, Duration::from_millis(100));
        cache.set("long", 2, TTL);

        sleep(Duration::from_millis(600)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test]
    async fn test_overwrite_survives_old_ttl() {
        let cache = UnboundedCache::new().unwrap();
        cache.set("key1", "old".to_string(), Duration::from_millis(100));
        cache.set("key1", "new".to_string(), TTL);

        sleep(Duration::from_millis(600)).await;

        assert_eq!(cache.get("key1"), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = UnboundedCache::new().unwrap();
        cache.set("key1", 1, TTL);

        cache.delete("key1");
        cache.delete("key1");
        cache.delete("never");

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_list_omits_expired_entries() {
        let cache = UnboundedCache::new().unwrap();
        cache.set("live", 1, TTL);
        cache.set("dead", 2, Duration::ZERO);

        let snapshot = cache.list();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["live"].value, 1);
        assert!(snapshot["live"].last_accessed_at.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_all_land() {
        let cache = UnboundedCache::new().unwrap();
        let mut handles = Vec::new();

        for task in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    cache.set(format!("task{task}-key{i}"), task * 100 + i, TTL);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 8 * 50);
        assert_eq!(cache.get("task3-key7"), Some(307));
    }
}
