//! Cache Entry Module
//!
//! Defines the record types stored by the cache variants, together with the
//! expiry deadline logic they share.

use std::time::{Duration, Instant};

use crate::store::reaper::Deferred;

/// TTLs beyond this bound are clamped so the deadline arithmetic cannot
/// overflow the monotonic clock. Thirty years of cache residency is
/// "effectively never" for an in-process store.
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

// == Entry ==
/// A stored value with its expiry deadline and write generation.
///
/// The `generation` counter starts at 1 and is bumped on every overwrite of
/// the same key. A pending expiry action captures the generation it was
/// armed for and must find the same generation in the store before it may
/// remove anything; without that check a timer armed for an old value could
/// delete a newer value written later under the same key.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    /// The stored value
    pub(crate) value: V,
    /// Deadline after which the entry is eligible for removal
    pub(crate) expires_at: Instant,
    /// Write generation this entry belongs to (1 for the first write)
    pub(crate) generation: u64,
    /// Cancellation token for the pending expiry action, once armed
    pub(crate) reaper: Option<Deferred>,
}

/// Computes the expiry deadline for a TTL starting now.
pub(crate) fn deadline(now: Instant, ttl: Duration) -> Instant {
    now + ttl.min(MAX_TTL)
}

impl<V> Entry<V> {
    /// Creates an entry expiring `ttl` from `now`, with no reaper armed yet.
    pub(crate) fn new(value: V, now: Instant, ttl: Duration, generation: u64) -> Self {
        Self {
            value,
            expires_at: deadline(now, ttl),
            generation,
            reaper: None,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry's deadline has passed.
    ///
    /// Boundary condition: an entry counts as expired when the current time
    /// is greater than or equal to its deadline, so an entry whose TTL has
    /// fully elapsed never reads as live.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// == Tracked Entry ==
/// An [`Entry`] extended with the last-access timestamp the evicting cache
/// ranks eviction candidates by.
#[derive(Debug)]
pub(crate) struct TrackedEntry<V> {
    pub(crate) entry: Entry<V>,
    /// Monotonic timestamp of the most recent successful access
    pub(crate) last_accessed_at: Instant,
}

impl<V> TrackedEntry<V> {
    pub(crate) fn new(value: V, now: Instant, ttl: Duration, generation: u64) -> Self {
        Self {
            entry: Entry::new(value, now, ttl, generation),
            last_accessed_at: now,
        }
    }

    /// Marks the entry as accessed now. `last_accessed_at` never moves
    /// backwards because the monotonic clock does not.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
    }
}

// == Entry Snapshot ==
/// A point-in-time copy of one cache entry, as returned by `list`.
///
/// `last_accessed_at` is `None` for cache variants that do not track
/// recency.
#[derive(Debug, Clone)]
pub struct EntrySnapshot<V> {
    /// The stored value at snapshot time
    pub value: V,
    /// Deadline after which the entry becomes eligible for removal
    pub expires_at: Instant,
    /// Most recent access, where the variant tracks it
    pub last_accessed_at: Option<Instant>,
    /// Write generation of the snapshotted value
    pub generation: u64,
}

impl<V> EntrySnapshot<V> {
    /// Returns the TTL left on the entry, or zero if the deadline passed.
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_starts_live() {
        let now = Instant::now();
        let entry = Entry::new("value", now, Duration::from_secs(60), 1);

        assert_eq!(entry.generation, 1);
        assert!(!entry.is_expired(now));
        assert!(entry.reaper.is_none());
    }

    #[test]
    fn test_entry_expiration_boundary() {
        let now = Instant::now();
        let entry = Entry::new("value", now, Duration::from_secs(5), 1);

        // Expired exactly at the deadline, not one tick later.
        assert!(!entry.is_expired(now + Duration::from_secs(4)));
        assert!(entry.is_expired(entry.expires_at));
        assert!(entry.is_expired(entry.expires_at + Duration::from_secs(1)));
    }

    #[test]
    fn test_entry_zero_ttl_is_immediately_expired() {
        let now = Instant::now();
        let entry = Entry::new("value", now, Duration::ZERO, 1);

        assert!(entry.is_expired(now));
    }

    #[test]
    fn test_entry_huge_ttl_is_clamped_not_overflowed() {
        let now = Instant::now();
        let entry = Entry::new("value", now, Duration::MAX, 1);

        assert_eq!(entry.expires_at, now + MAX_TTL);
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_tracked_entry_touch_advances_recency() {
        let now = Instant::now();
        let mut tracked = TrackedEntry::new("value", now, Duration::from_secs(60), 1);
        assert_eq!(tracked.last_accessed_at, now);

        let later = now + Duration::from_millis(50);
        tracked.touch(later);
        assert_eq!(tracked.last_accessed_at, later);
    }

    #[test]
    fn test_snapshot_remaining_ttl() {
        let now = Instant::now();
        let live = EntrySnapshot {
            value: "value",
            expires_at: now + Duration::from_secs(60),
            last_accessed_at: Some(now),
            generation: 1,
        };
        let remaining = live.remaining_ttl();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining >= Duration::from_secs(59));

        let expired = EntrySnapshot {
            value: "value",
            expires_at: now,
            last_accessed_at: None,
            generation: 3,
        };
        assert_eq!(expired.remaining_ttl(), Duration::ZERO);
    }
}
