//! Concurrency Integration Tests
//!
//! Exercises the cache variants from many preemptively scheduled threads
//! at once: the capacity bound must hold at every observation point, reaper
//! firings must interleave safely with foreground calls, and a final
//! consistency scan over an owned snapshot (no lock held) must find only
//! intact values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use memstash::{BoundedCache, LruCache};

// == Helper Functions ==

/// Every write stores a value derived from its key, so the final scan can
/// tell a torn or misplaced value from a correct one.
fn value_for(key: &str) -> String {
    format!("value-of-{key}")
}

const LONG_TTL: Duration = Duration::from_secs(60);

// == Evicting Cache Under Contention ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_operations_hold_the_capacity_invariant() {
    const THREADS: usize = 8;
    const OPS: usize = 500;
    const CAPACITY: usize = 32;

    let cache = LruCache::new(CAPACITY).unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..OPS {
                    let key = format!("key{}", (t * 31 + i * 7) % 64);
                    match i % 5 {
                        0 | 1 | 2 => cache.set(key.clone(), value_for(&key), LONG_TTL),
                        3 => {
                            let _ = cache.get(&key);
                        }
                        _ => cache.delete(&key),
                    }
                    assert!(
                        cache.len() <= CAPACITY,
                        "capacity bound violated mid-flight"
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Final consistency scan over an owned snapshot, no lock held.
    let snapshot = cache.list();
    assert!(snapshot.len() <= CAPACITY);
    assert_eq!(snapshot.len(), cache.len());
    for (key, entry) in &snapshot {
        assert_eq!(&entry.value, &value_for(key), "corrupted value under '{key}'");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_key_floods_never_exceed_capacity() {
    const CAPACITY: usize = 16;

    let cache = LruCache::new(CAPACITY).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("thread{t}-key{i}");
                    cache.set(key.clone(), value_for(&key), LONG_TTL);
                    assert!(cache.len() <= CAPACITY);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Inserts only, far more than fit: the store ends exactly full.
    assert_eq!(cache.len(), CAPACITY);
}

// == Reapers Racing Foreground Callers ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reapers_contend_safely_with_foreground_writers() {
    let cache = LruCache::new(64).unwrap();

    let writers: Vec<_> = (0..2)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..8 {
                    let short = format!("short-{t}-{i}");
                    let long = format!("long-{t}-{i}");
                    cache.set(short.clone(), value_for(&short), Duration::from_millis(100));
                    cache.set(long.clone(), value_for(&long), LONG_TTL);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    tokio::time::sleep(Duration::from_millis(800)).await;

    for t in 0..2 {
        for i in 0..8 {
            let short = format!("short-{t}-{i}");
            let long = format!("long-{t}-{i}");
            assert_eq!(cache.get(&short), None, "'{short}' outlived its ttl");
            assert_eq!(
                cache.get(&long),
                Some(value_for(&long)),
                "'{long}' lost to a stale reaper"
            );
        }
    }
    assert_eq!(cache.len(), 16);
}

// == Rejecting Cache: Readers Proceed During Writes ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bounded_cache_serves_readers_during_writes() {
    const ROUNDS: u64 = 1000;

    let cache = BoundedCache::new(4).unwrap();
    cache.set("shared", 0u64, LONG_TTL).unwrap();

    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    // Reads never block each other; every observed value is
                    // a complete write, never a torn one.
                    let value = cache.get("shared").expect("entry never removed");
                    assert!(value >= observed, "value went backwards");
                    assert!(value <= ROUNDS);
                    observed = value;
                }
            })
        })
        .collect();

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            for i in 1..=ROUNDS {
                cache.set("shared", i, LONG_TTL).unwrap();
            }
        })
    };

    writer.join().unwrap();
    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(cache.get("shared"), Some(ROUNDS));
}
