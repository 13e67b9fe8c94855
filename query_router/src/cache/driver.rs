//! [`ResultCache`] — LRU + TTL + mtime-witness result cache (spec.md §4.4).
//!
//! Grounded in the teacher's `cache_system::cache::driver::CacheDriver`: a single lock around an
//! inner state struct, with get-and-promote as one atomic operation. Unlike the teacher's driver
//! this cache is synchronous and does not coalesce concurrent loads — the engine pipeline
//! (spec.md §4.5) runs its stages sequentially, so there is never more than one in-flight query
//! per cache at a time.

use super::entry::{cache_key, CacheEntry};
use crate::clock::{Clock, TimeMs};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The outcome of a [`ResultCache::get`] lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// A live, fresh entry was found and promoted to most-recently-used.
    Hit(V),
    /// No entry exists for this key.
    Miss,
    /// An entry exists but its witness mtime no longer matches; it was removed.
    Stale,
}

/// A point-in-time snapshot of cache effectiveness (spec.md §4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries evicted to respect `max_entries`.
    pub evictions: u64,
    /// Entries lazily removed for having an elapsed TTL.
    pub expirations: u64,
    /// Entries removed because their witness mtime no longer matched.
    pub stale_invalidations: u64,
    /// Live entry count.
    pub size: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// `hits / (hits + misses)`, `0.0` when both are zero (spec.md §4.4 invariant iii).
    pub hit_rate: f64,
}

struct State<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Most-recently-used at the back.
    order: Vec<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    stale_invalidations: u64,
}

impl<V> State<V> {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// The result cache: keyed by [`cache_key`], bounded by `max_entries`, with TTL and mtime-witness
/// staleness detection.
pub struct ResultCache<V> {
    state: Mutex<State<V>>,
    max_entries: usize,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache bounded at `max_entries`, with the given TTL (`0` disables TTL) and clock
    /// source (spec.md §6 `cache.max_entries`/`cache.ttl_ms`).
    pub fn new(max_entries: usize, ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                stale_invalidations: 0,
            }),
            max_entries,
            ttl_ms,
            clock,
        }
    }

    /// Look up `canonical_text`/`witness_paths`, checking `current_witness_mtime_ns` against the
    /// stored witness. A hit atomically promotes the entry to most-recently-used.
    pub fn get(
        &self,
        canonical_text: &str,
        witness_paths: &[String],
        current_witness_mtime_ns: i64,
    ) -> Lookup<V> {
        let key = cache_key(canonical_text, witness_paths);
        let mut state = self.state.lock();
        let now = self.clock.now_ms();

        let Some(entry) = state.entries.get(&key) else {
            state.misses += 1;
            return Lookup::Miss;
        };

        if entry.is_expired(now) {
            state.remove(&key);
            state.expirations += 1;
            state.misses += 1;
            return Lookup::Miss;
        }

        if entry.witness_max_mtime_ns != current_witness_mtime_ns {
            state.remove(&key);
            state.stale_invalidations += 1;
            return Lookup::Stale;
        }

        let value = entry.value.clone();
        state.touch(&key);
        state.hits += 1;
        Lookup::Hit(value)
    }

    /// Insert a result, evicting the least-recently-used entry if this insertion exceeds
    /// `max_entries`.
    pub fn put(
        &self,
        canonical_text: &str,
        witness_paths: &[String],
        witness_max_mtime_ns: i64,
        value: V,
    ) {
        let key = cache_key(canonical_text, witness_paths);
        let now = self.clock.now_ms();
        let expires_at_ms = if self.ttl_ms == 0 {
            None
        } else {
            Some(now + self.ttl_ms)
        };

        let mut state = self.state.lock();
        if !state.entries.contains_key(&key) {
            state.order.push(key.clone());
        } else {
            state.touch(&key);
        }
        state.entries.insert(
            key,
            CacheEntry {
                value,
                witness_max_mtime_ns,
                inserted_at_ms: now,
                expires_at_ms,
            },
        );

        while state.entries.len() > self.max_entries {
            if let Some(lru_key) = state.order.first().cloned() {
                state.remove(&lru_key);
                state.evictions += 1;
            } else {
                break;
            }
        }
    }

    /// Remove every entry whose witness paths satisfy `predicate` (spec.md §4.4 `invalidate`).
    pub fn invalidate<F>(&self, predicate: F)
    where
        F: Fn(&str) -> bool,
    {
        let mut state = self.state.lock();
        let victims: Vec<String> = state
            .entries
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();
        for key in victims {
            state.remove(&key);
        }
    }

    /// Snapshot current effectiveness stats.
    pub fn stats(&self) -> CacheStats {
        let mut state = self.state.lock();
        let now = self.clock.now_ms();

        let expired_keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired_keys {
            state.remove(&key);
            state.expirations += 1;
        }

        let denom = state.hits + state.misses;
        let hit_rate = if denom == 0 {
            0.0
        } else {
            state.hits as f64 / denom as f64
        };

        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
            stale_invalidations: state.stale_invalidations,
            size: state.entries.len(),
            capacity: self.max_entries,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    fn cache(max_entries: usize, ttl_ms: i64) -> (ResultCache<i32>, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(0));
        (ResultCache::new(max_entries, ttl_ms, clock.clone()), clock)
    }

    #[test]
    fn miss_then_hit() {
        let (cache, _clock) = cache(100, 0);
        assert_eq!(cache.get("q", &["/a".into()], 0), Lookup::Miss);
        cache.put("q", &["/a".into()], 0, 42);
        assert_eq!(cache.get("q", &["/a".into()], 0), Lookup::Hit(42));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn mtime_mismatch_is_stale_and_removed() {
        let (cache, _clock) = cache(100, 0);
        cache.put("q", &["/a".into()], 10, 42);
        assert_eq!(cache.get("q", &["/a".into()], 11), Lookup::Stale);
        assert_eq!(cache.get("q", &["/a".into()], 11), Lookup::Miss);
        assert_eq!(cache.stats().stale_invalidations, 1);
    }

    #[test]
    fn lru_eviction_respects_capacity() {
        let (cache, _clock) = cache(2, 0);
        cache.put("a", &[], 0, 1);
        cache.put("b", &[], 0, 2);
        cache.put("c", &[], 0, 3);
        assert_eq!(cache.get("a", &[], 0), Lookup::Miss);
        assert_eq!(cache.get("b", &[], 0), Lookup::Hit(2));
        assert_eq!(cache.get("c", &[], 0), Lookup::Hit(3));
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.stats().size <= 2);
    }

    #[test]
    fn recently_used_entry_survives_eviction() {
        let (cache, _clock) = cache(2, 0);
        cache.put("a", &[], 0, 1);
        cache.put("b", &[], 0, 2);
        // touch "a" so "b" becomes the LRU victim
        assert_eq!(cache.get("a", &[], 0), Lookup::Hit(1));
        cache.put("c", &[], 0, 3);
        assert_eq!(cache.get("b", &[], 0), Lookup::Miss);
        assert_eq!(cache.get("a", &[], 0), Lookup::Hit(1));
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let (cache, clock) = cache(100, 1_000);
        cache.put("q", &[], 0, 42);
        clock.advance(1_001);
        assert_eq!(cache.get("q", &[], 0), Lookup::Miss);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn zero_ttl_disables_expiration() {
        let (cache, clock) = cache(100, 0);
        cache.put("q", &[], 0, 42);
        clock.advance(10_000_000);
        assert_eq!(cache.get("q", &[], 0), Lookup::Hit(42));
    }

    #[test]
    fn invalidate_removes_matching_entries() {
        let (cache, _clock) = cache(100, 0);
        cache.put("q1", &["/d/x".into()], 0, 1);
        cache.put("q2", &["/d/y".into()], 0, 2);
        let victim_key = cache_key("q1", &["/d/x".into()]);
        cache.invalidate(|k| k == victim_key);
        assert_eq!(cache.get("q1", &["/d/x".into()], 0), Lookup::Miss);
        assert_eq!(cache.get("q2", &["/d/y".into()], 0), Lookup::Hit(2));
    }
}
