//! Runtime configuration (spec.md §6).
//!
//! Mirrors the shape of the teacher's `clap_blocks` config structs: a plain, `Default`-able
//! struct with direct field access and a builder-style `with_*` API, minus the `clap` derive
//! (that lives on [`crate::cli::Cli`] instead, which maps CLI flags onto this struct).

use crate::cost::MemoryLimits;
use crate::sql::Dialect;

/// Result cache sizing and lifetime (spec.md §4.4, §6 `cache.*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum live entries before LRU eviction.
    pub max_entries: usize,
    /// Entry lifetime in milliseconds; `0` disables TTL expiry.
    pub ttl_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl_ms: 3_600_000,
        }
    }
}

/// Backend selection tuning (spec.md §4.3, §6 `selector.*`).
#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Per-backend memory ceilings.
    pub memory_limits: MemoryLimits,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            memory_limits: MemoryLimits::default(),
        }
    }
}

/// Partition-scan concurrency (spec.md §6 `partition_scan.parallelism`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionScanConfig {
    /// Number of tables whose partition indexes may be rebuilt concurrently.
    ///
    /// The engine itself walks tables sequentially today (spec.md §4.5); this is carried as
    /// configuration for the executor implementations that do parallelize their own scan.
    pub parallelism: usize,
}

impl Default for PartitionScanConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

/// Top-level router configuration (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    /// Result cache sizing and lifetime.
    pub cache: CacheConfig,
    /// Backend selection tuning.
    pub selector: SelectorConfig,
    /// Partition-scan concurrency.
    pub partition_scan: PartitionScanConfig,
    /// Dialect new queries are parsed under when the caller doesn't override it.
    pub default_dialect: Dialect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            selector: SelectorConfig::default(),
            partition_scan: PartitionScanConfig::default(),
            default_dialect: Dialect::Generic,
        }
    }
}

impl Config {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the cache's max entry count.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    /// Override the cache's TTL, in milliseconds (`0` disables expiry).
    pub fn with_cache_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.cache.ttl_ms = ttl_ms;
        self
    }

    /// Override the vectorized backend's memory ceiling, in bytes.
    pub fn with_vectorized_memory_limit_bytes(mut self, bytes: u64) -> Self {
        self.selector.memory_limits.vectorized = bytes;
        self
    }

    /// Override the parallel backend's memory ceiling, in bytes.
    pub fn with_parallel_memory_limit_bytes(mut self, bytes: u64) -> Self {
        self.selector.memory_limits.parallel = bytes;
        self
    }

    /// Override the distributed backend's node count.
    pub fn with_distributed_nodes(mut self, nodes: u32) -> Self {
        self.selector.memory_limits.distributed_nodes = nodes;
        self
    }

    /// Override the partition-scan parallelism hint.
    pub fn with_partition_scan_parallelism(mut self, parallelism: usize) -> Self {
        self.partition_scan.parallelism = parallelism;
        self
    }

    /// Override the default parse dialect.
    pub fn with_default_dialect(mut self, dialect: Dialect) -> Self {
        self.default_dialect = dialect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.ttl_ms, 3_600_000);
        assert_eq!(config.selector.memory_limits.distributed_nodes, 1);
        assert_eq!(config.partition_scan.parallelism, 1);
        assert_eq!(config.default_dialect, Dialect::Generic);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = Config::new()
            .with_cache_max_entries(10)
            .with_cache_ttl_ms(0)
            .with_vectorized_memory_limit_bytes(1)
            .with_distributed_nodes(4)
            .with_default_dialect(Dialect::Postgres);

        assert_eq!(config.cache.max_entries, 10);
        assert_eq!(config.cache.ttl_ms, 0);
        assert_eq!(config.selector.memory_limits.vectorized, 1);
        assert_eq!(config.selector.memory_limits.distributed_nodes, 4);
        assert_eq!(config.default_dialect, Dialect::Postgres);
    }
}
