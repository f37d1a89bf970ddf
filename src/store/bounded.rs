//! Bounded Cache Module
//!
//! The capacity-bounded sibling of the evicting cache: instead of making
//! room, `set` on a full store returns a capacity error. Nothing here
//! mutates on read (there is no recency to track), so the store sits
//! behind a reader/writer lock and lookups proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{CacheError, Result};
use crate::store::entry::{Entry, EntrySnapshot};
use crate::store::reaper::{Scheduler, TokioScheduler};
use crate::store::Cache;

// == Bounded Cache ==
/// Fixed-capacity cache that rejects inserts when full.
///
/// Handles are cheap to clone and share one underlying store.
pub struct BoundedCache<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    capacity: usize,
    scheduler: Arc<dyn Scheduler>,
}

impl<V> Clone for BoundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.shared.capacity)
            .field("len", &self.shared.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl<V> BoundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Errors
    /// [`CacheError::InvalidCapacity`] if `capacity` is zero;
    /// [`CacheError::SchedulerUnavailable`] outside a tokio runtime.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new()?);
        Self::with_scheduler(capacity, scheduler)
    }

    /// Creates a cache with an explicit scheduler.
    ///
    /// # Errors
    /// [`CacheError::InvalidCapacity`] if `capacity` is zero.
    pub fn with_scheduler(capacity: usize, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::with_capacity(capacity)),
                capacity,
                scheduler,
            }),
        })
    }

    // == Set ==
    /// Stores `value` under `key` with the given TTL.
    ///
    /// Overwriting an existing key always succeeds; the slot is already
    /// occupied. Inserting a new key on a full store fails and leaves the
    /// store unchanged.
    ///
    /// # Errors
    /// [`CacheError::CapacityExceeded`] when the key is new and the store
    /// is at capacity.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        let key = key.into();
        let now = Instant::now();
        let mut stale_reaper = None;

        let generation = {
            let mut entries = self.shared.entries.write();
            let generation = match entries.get(&key).map(|e| e.generation) {
                Some(previous) => previous + 1,
                None => {
                    if entries.len() == self.shared.capacity {
                        return Err(CacheError::CapacityExceeded {
                            capacity: self.shared.capacity,
                        });
                    }
                    1
                }
            };
            let replaced = entries.insert(key.clone(), Entry::new(value, now, ttl, generation));
            if let Some(replaced) = replaced {
                stale_reaper = replaced.reaper;
            }
            generation
        };

        if let Some(reaper) = stale_reaper {
            reaper.cancel();
        }
        self.arm_reaper(key, ttl, generation);
        Ok(())
    }

    // == Get ==
    /// Retrieves the value stored under `key`, or `None` if absent.
    ///
    /// Takes the read lock only: lookups mutate nothing and run in
    /// parallel. An entry past its deadline reads as absent; its removal
    /// stays with the reaper, since the read path must not take the write
    /// lock.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.shared.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            _ => None,
        }
    }

    // == Delete ==
    /// Removes the entry under `key` and cancels its pending expiry action.
    /// Deleting an absent key is a silent no-op.
    pub fn delete(&self, key: &str) {
        let removed = self.shared.entries.write().remove(key);
        if let Some(entry) = removed {
            if let Some(reaper) = entry.reaper {
                reaper.cancel();
            }
            debug!(%key, "entry deleted");
        }
    }

    // == List ==
    /// Returns a point-in-time copy of every live entry. Entries past
    /// their deadline are omitted but left in place for the reaper.
    pub fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        let now = Instant::now();
        let entries = self.shared.entries.read();
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| {
                (
                    key.clone(),
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
        self.shared.entries.read().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity this cache was built with.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    // == Reaper Arming ==
    /// Schedules the expiry action for `generation` of `key`; the token is
    /// attached outside the write critical section that performed the
    /// insert, and only if that write is still current.
    fn arm_reaper(&self, key: String, ttl: Duration, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        let reap_key = key.clone();
        let token = self.shared.scheduler.defer(
            ttl,
            Box::new(move || reap(weak, reap_key, generation)),
        );

        let mut token = Some(token);
        {
            let mut entries = self.shared.entries.write();
            if let Some(entry) = entries.get_mut(&key) {
                if entry.generation == generation {
                    entry.reaper = token.take();
                }
            }
        }
        if let Some(unused) = token {
            unused.cancel();
        }
    }
}

// == Reap ==
/// Removes `key` under the write lock, only while its generation still
/// matches the one the action was armed for.
fn reap<V>(shared: Weak<Shared<V>>, key: String, generation: u64) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut entries = shared.entries.write();
    match entries.get(&key).map(|e| e.generation) {
        Some(current) if current == generation => {
            entries.remove(&key);
            debug!(%key, generation, "ttl elapsed, entry reaped");
        }
        Some(_) => trace!(%key, generation, "stale reaper skipped, entry was overwritten"),
        None => trace!(%key, generation, "stale reaper skipped, entry already gone"),
    }
}

impl<V> Cache<V> for BoundedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: String, value: V, ttl: Duration) -> Result<()> {
        BoundedCache::set(self, key, value, ttl)
    }

    fn get(&self, key: &str) -> Option<V> {
        BoundedCache::get(self, key)
    }

    fn delete(&self, key: &str) {
        BoundedCache::delete(self, key);
    }

    fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        BoundedCache::list(self)
    }

    fn len(&self) -> usize {
        BoundedCache::len(self)
    }
}
