//! Recency Tracking Module
//!
//! Selects the eviction victim for the bounded evicting cache: the entry
//! with the oldest `last_accessed_at`, ties broken by smallest key in
//! lexicographic order so eviction is reproducible under test.
//!
//! Selection is a full scan, O(n) per eviction. That is acceptable at the
//! capacities this cache targets; at larger scale an ordered recency index
//! (doubly linked list over the keys with O(1) move-to-front and tail pop)
//! would replace the scan without changing which entry is chosen.

use std::collections::HashMap;

use crate::store::entry::TrackedEntry;

// == Victim Selection ==
/// Returns the key of the least recently accessed entry, or `None` if the
/// map is empty.
///
/// Runs inside the caller's critical section; the caller removes the victim
/// through the map it already holds, so no lock is re-acquired.
pub(crate) fn select_victim<V>(entries: &HashMap<String, TrackedEntry<V>>) -> Option<String> {
    let mut victim: Option<(std::time::Instant, &String)> = None;
    for (key, tracked) in entries {
        let candidate = (tracked.last_accessed_at, key);
        if victim.map_or(true, |best| candidate < best) {
            victim = Some(candidate);
        }
    }
    victim.map(|(_, key)| key.clone())
}
