//! Evicting Cache Module
//!
//! The core store: bounded capacity, least-recently-accessed eviction, TTL
//! expiry, all behind one mutual-exclusion lock per cache instance.
//!
//! Three independent triggers remove entries (explicit `delete`, capacity
//! eviction during `set`, and the TTL reaper firing), and every one of them
//! funnels through the same lock. Reads also take the exclusive lock: a hit
//! refreshes the entry's recency, so even `get` mutates state and a
//! reader/writer split would not help.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::store::entry::{EntrySnapshot, TrackedEntry};
use crate::store::reaper::{Scheduler, TokioScheduler};
use crate::store::stats::CacheStats;
use crate::store::{recency, Cache};

// == Lru Cache ==
/// Bounded in-memory cache that evicts the least recently accessed entry
/// when a new key is inserted at capacity.
///
/// Handles are cheap to clone and share one underlying store, so a cache
/// can be handed to as many threads as needed. All operations are
/// synchronous and blocking; none returns a runtime error.
pub struct LruCache<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    /// The single lock every operation and every reaper firing goes through
    state: Mutex<State<V>>,
    capacity: usize,
    touch_on_list: bool,
    scheduler: Arc<dyn Scheduler>,
}

struct State<V> {
    entries: HashMap<String, TrackedEntry<V>>,
    stats: CacheStats,
}

impl<V> Clone for LruCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.shared.capacity)
            .field("len", &self.shared.state.lock().entries.len())
            .finish_non_exhaustive()
    }
}

impl<V> LruCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries, scheduling TTL
    /// expirations on the current tokio runtime.
    ///
    /// # Errors
    /// [`CacheError::InvalidCapacity`](crate::CacheError::InvalidCapacity)
    /// if `capacity` is zero;
    /// [`CacheError::SchedulerUnavailable`](crate::CacheError::SchedulerUnavailable)
    /// when called outside a tokio runtime.
    pub fn new(capacity: usize) -> Result<Self> {
        let config = CacheConfig::new(capacity);
        config.validate()?;
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new()?);
        Self::with_config(config, scheduler)
    }

    /// Creates a cache from a full configuration and an explicit scheduler.
    ///
    /// # Errors
    /// Returns the configuration fault reported by
    /// [`CacheConfig::validate`].
    pub fn with_config(config: CacheConfig, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    entries: HashMap::with_capacity(config.capacity),
                    stats: CacheStats::new(),
                }),
                capacity: config.capacity,
                touch_on_list: config.touch_on_list,
                scheduler,
            }),
        })
    }

    // == Set ==
    /// Stores `value` under `key` with the given TTL. Never fails.
    ///
    /// Overwriting an existing key replaces its value, resets its expiry
    /// and recency, and bumps its generation; the slot is already occupied,
    /// so no capacity check applies. Inserting a new key at capacity first
    /// evicts the least recently accessed entry inside the same critical
    /// section, so no caller ever observes the store above capacity.
    ///
    /// The expiry action for this write is armed after the lock is
    /// released, then attached to the entry only if the write is still
    /// current.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut stale_reaper = None;

        let generation = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            let generation = match state.entries.get(&key).map(|t| t.entry.generation) {
                Some(previous) => previous + 1,
                None => {
                    if state.entries.len() == self.shared.capacity {
                        if let Some(victim) = recency::select_victim(&state.entries) {
                            if let Some(evicted) = state.entries.remove(&victim) {
                                stale_reaper = evicted.entry.reaper;
                                state.stats.record_eviction();
                                debug!(key = %victim, "evicted least recently accessed entry");
                            }
                        }
                    }
                    1
                }
            };

            let replaced = state
                .entries
                .insert(key.clone(), TrackedEntry::new(value, now, ttl, generation));
            if let Some(replaced) = replaced {
                stale_reaper = replaced.entry.reaper;
            }
            let count = state.entries.len();
            state.stats.set_total_entries(count);
            generation
        };

        if let Some(reaper) = stale_reaper {
            reaper.cancel();
        }
        self.arm_reaper(key, ttl, generation);
    }

    // == Get ==
    /// Retrieves the value stored under `key`, or `None` if absent.
    ///
    /// A hit refreshes the entry's `last_accessed_at`, directly feeding the
    /// eviction order. An entry past its deadline that the reaper has not
    /// reached yet is dropped here and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut stale_reaper = None;

        let result = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            match state.entries.get(key).map(|t| t.entry.is_expired(now)) {
                Some(false) => match state.entries.get_mut(key) {
                    Some(tracked) => {
                        tracked.touch(now);
                        state.stats.record_hit();
                        Some(tracked.entry.value.clone())
                    }
                    None => None,
                },
                Some(true) => {
                    if let Some(removed) = state.entries.remove(key) {
                        stale_reaper = removed.entry.reaper;
                    }
                    state.stats.record_expiration();
                    state.stats.record_miss();
                    let count = state.entries.len();
                    state.stats.set_total_entries(count);
                    trace!(%key, "expired entry dropped on read");
                    None
                }
                None => {
                    state.stats.record_miss();
                    None
                }
            }
        };

        if let Some(reaper) = stale_reaper {
            reaper.cancel();
        }
        result
    }

    // == Delete ==
    /// Removes the entry under `key` and cancels its pending expiry action.
    /// Deleting an absent key is a silent no-op.
    pub fn delete(&self, key: &str) {
        let removed = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;
            let removed = state.entries.remove(key);
            if removed.is_some() {
                let count = state.entries.len();
                state.stats.set_total_entries(count);
            }
            removed
        };

        if let Some(tracked) = removed {
            if let Some(reaper) = tracked.entry.reaper {
                reaper.cancel();
            }
            debug!(%key, "entry deleted");
        }
    }

    // == List ==
    /// Returns a point-in-time copy of every live entry.
    ///
    /// Entries past their deadline are dropped before the snapshot is
    /// taken. When the cache was configured with `touch_on_list` (the
    /// default), every returned entry's recency is refreshed to the call
    /// time: listing counts as accessing.
    pub fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        let now = Instant::now();
        let mut stale_reapers = Vec::new();

        let snapshot = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            let expired: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, tracked)| tracked.entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in expired {
                if let Some(removed) = state.entries.remove(&key) {
                    if let Some(reaper) = removed.entry.reaper {
                        stale_reapers.push(reaper);
                    }
                    state.stats.record_expiration();
                }
            }

            let mut snapshot = HashMap::with_capacity(state.entries.len());
            for (key, tracked) in state.entries.iter_mut() {
                if self.shared.touch_on_list {
                    tracked.touch(now);
                }
                snapshot.insert(
                    key.clone(),
                    EntrySnapshot {
                        value: tracked.entry.value.clone(),
                        expires_at: tracked.entry.expires_at,
                        last_accessed_at: Some(tracked.last_accessed_at),
                        generation: tracked.entry.generation,
                    },
                );
            }
            let count = state.entries.len();
            state.stats.set_total_entries(count);
            snapshot
        };

        for reaper in stale_reapers {
            reaper.cancel();
        }
        snapshot
    }

    // == Accessors ==
    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity this cache was built with.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns a copy of the current performance counters.
    pub fn stats(&self) -> CacheStats {
        let guard = self.shared.state.lock();
        let mut stats = guard.stats.clone();
        stats.set_total_entries(guard.entries.len());
        stats
    }

    // == Reaper Arming ==
    /// Schedules the expiry action for `generation` of `key` and attaches
    /// its cancellation token to the entry.
    ///
    /// Runs with the lock released: the scheduler call only registers the
    /// action, but holding the lock across a foreign call invites
    /// reentrancy. Between unlock and here the entry may have been
    /// overwritten or reaped, so the token is attached under a fresh
    /// critical section only when the generation still matches; otherwise
    /// the freshly armed action is cancelled again.
    fn arm_reaper(&self, key: String, ttl: Duration, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        let reap_key = key.clone();
        let token = self.shared.scheduler.defer(
            ttl,
            Box::new(move || reap(weak, reap_key, generation)),
        );

        let mut token = Some(token);
        {
            let mut guard = self.shared.state.lock();
            if let Some(tracked) = guard.entries.get_mut(&key) {
                if tracked.entry.generation == generation {
                    tracked.entry.reaper = token.take();
                }
            }
        }
        if let Some(unused) = token {
            unused.cancel();
        }
    }
}

// == Reap ==
/// Expiry action body: removes `key` only if its generation still matches
/// the one captured when the action was armed. A stale action, one whose
/// entry was overwritten or already removed, is a no-op; without the
/// generation check a timer armed for an old value would delete a newer
/// value written later under the same key.
fn reap<V>(shared: Weak<Shared<V>>, key: String, generation: u64) {
    // A dropped cache turns pending actions into no-ops.
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut guard = shared.state.lock();
    let state = &mut *guard;

    match state.entries.get(&key).map(|t| t.entry.generation) {
        Some(current) if current == generation => {
            state.entries.remove(&key);
            state.stats.record_expiration();
            let count = state.entries.len();
            state.stats.set_total_entries(count);
            debug!(%key, generation, "ttl elapsed, entry reaped");
        }
        Some(_) => trace!(%key, generation, "stale reaper skipped, entry was overwritten"),
        None => trace!(%key, generation, "stale reaper skipped, entry already gone"),
    }
}

impl<V> Cache<V> for LruCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Infallible for this variant; the trait signature carries the error
    /// for siblings that reject instead of evicting.
    fn set(&self, key: String, value: V, ttl: Duration) -> Result<()> {
        LruCache::set(self, key, value, ttl);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        LruCache::get(self, key)
    }

    fn delete(&self, key: &str) {
        LruCache::delete(self, key);
    }

    fn list(&self) -> HashMap<String, EntrySnapshot<V>> {
        LruCache::list(self)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }
}
