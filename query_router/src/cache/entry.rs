//! Cache keys and entries (spec.md §4.4).

use crate::clock::TimeMs;
use sha2::{Digest, Sha256};

/// Compute the cache key for a query: `sha256(canonical_text || '\0' || join(sorted_witness_paths,
/// '\0'))` (spec.md §4.4). `witness_paths` must already be sorted — callers get this for free from
/// [`crate::pruner::ScanPlan::witness_paths`].
pub fn cache_key(canonical_text: &str, witness_paths: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_text.as_bytes());
    hasher.update([0u8]);
    hasher.update(witness_paths.join("\0").as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A single cached result plus the bookkeeping needed to detect staleness and expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// `max(mtime_ns)` over the witness paths at insertion time (spec.md §4.4).
    pub witness_max_mtime_ns: i64,
    /// When this entry was inserted.
    pub inserted_at_ms: TimeMs,
    /// When this entry expires, or `None` if TTL is disabled (`ttl_ms == 0`).
    pub expires_at_ms: Option<TimeMs>,
}

impl<V> CacheEntry<V> {
    /// Whether this entry's TTL has elapsed as of `now_ms`.
    pub fn is_expired(&self, now_ms: TimeMs) -> bool {
        matches!(self.expires_at_ms, Some(expires_at) if expires_at <= now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_for_identical_inputs() {
        let a = cache_key("SELECT 1", &["/d/a".to_string(), "/d/b".to_string()]);
        let b = cache_key("SELECT 1", &["/d/a".to_string(), "/d/b".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn key_changes_with_witness_paths() {
        let a = cache_key("SELECT 1", &["/d/a".to_string()]);
        let b = cache_key("SELECT 1", &["/d/b".to_string()]);
        assert_ne!(a, b);
    }
}
