//! The cost model and backend selector (spec.md §4.3).

use crate::sql::Features;
use snafu::prelude::*;

/// The execution backends the router can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-node vectorized execution.
    Vectorized,
    /// Single-node, multi-threaded parallel execution.
    Parallel,
    /// Multi-node distributed execution.
    Distributed,
}

impl BackendKind {
    /// All kinds, in tie-break preference order (spec.md §4.3).
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Vectorized,
        BackendKind::Parallel,
        BackendKind::Distributed,
    ];

    fn startup_ms(&self) -> f64 {
        match self {
            BackendKind::Vectorized => 100.0,
            BackendKind::Parallel => 200.0,
            BackendKind::Distributed => 15_000.0,
        }
    }

    /// Bytes/ms throughput; `Distributed` scales with `distributed_nodes`.
    fn throughput_bytes_per_ms(&self, distributed_nodes: u32) -> f64 {
        const MB: f64 = 1_000_000.0;
        match self {
            BackendKind::Vectorized => 2_000.0 * MB / 1000.0,
            BackendKind::Parallel => 1_800.0 * MB / 1000.0,
            BackendKind::Distributed => 1_500.0 * MB / 1000.0 * distributed_nodes.max(1) as f64,
        }
    }

    /// `1 + k·score`, the per-kind complexity multiplier. Also used, per spec.md §4.3, as the
    /// `working_set_factor(score)` in the feasibility check — the spec names both but defines
    /// only one closed form, and every backend's memory pressure scales with the same shape.
    fn complexity_multiplier(&self, complexity: u32) -> f64 {
        let k = match self {
            BackendKind::Vectorized => 0.10,
            BackendKind::Parallel => 0.08,
            BackendKind::Distributed => 0.05,
        };
        1.0 + k * complexity as f64
    }

    fn memory_limit_bytes(&self, limits: &MemoryLimits) -> Option<u64> {
        match self {
            BackendKind::Vectorized => Some(limits.vectorized),
            BackendKind::Parallel => Some(limits.parallel),
            BackendKind::Distributed => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Vectorized => "vectorized",
            BackendKind::Parallel => "parallel",
            BackendKind::Distributed => "distributed",
        };
        write!(f, "{name}")
    }
}

/// Device memory ceilings for backends with a finite working set (spec.md §6
/// `selector.memory_limit_bytes.*`). `Distributed` has no limit.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimits {
    /// Ceiling for `Vectorized`.
    pub vectorized: u64,
    /// Ceiling for `Parallel`.
    pub parallel: u64,
    /// Node count `Distributed` throughput scales with (spec.md §6 `selector.distributed_nodes`).
    pub distributed_nodes: u32,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            vectorized: 8 * 1_000_000_000,
            parallel: 32 * 1_000_000_000,
            distributed_nodes: 1,
        }
    }
}

/// One backend's scored candidacy.
#[derive(Debug, Clone)]
pub struct BackendCandidate {
    /// The backend this candidate describes.
    pub kind: BackendKind,
    /// Estimated wall-clock execution time.
    pub estimated_ms: f64,
    /// Whether this backend can hold the scan's working set.
    pub feasible: bool,
    /// Human-readable justification citing the deciding factor (spec.md §4.3).
    pub reason: String,
}

/// Errors raised by the selector.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Every backend was infeasible for this scan.
    #[snafu(display("no feasible backend: {reason}"))]
    NoFeasibleBackend {
        /// Summary of why every candidate was rejected.
        reason: String,
    },
}

/// Result alias for the cost model.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Score every [`BackendKind`] for a scan of `bytes_scanned` bytes with the given query
/// `features`, in `BackendKind::ALL` order.
pub fn score_candidates(
    bytes_scanned: u64,
    features: &Features,
    limits: &MemoryLimits,
) -> Vec<BackendCandidate> {
    let selectivity_factor = features.selectivity.max(0.1);
    let complexity = features.complexity;

    BackendKind::ALL
        .iter()
        .map(|&kind| {
            let multiplier = kind.complexity_multiplier(complexity);
            let estimated_ms = kind.startup_ms()
                + (bytes_scanned as f64 / kind.throughput_bytes_per_ms(limits.distributed_nodes))
                    * multiplier
                    * selectivity_factor;

            let working_set = bytes_scanned as f64 * multiplier;
            let (feasible, reason) = match kind.memory_limit_bytes(limits) {
                None => (true, format!("{kind}: no memory ceiling, startup {0:.0}ms", kind.startup_ms())),
                Some(limit) if working_set <= limit as f64 => (
                    true,
                    format!(
                        "{kind}: working set {working_set:.0}B within {limit}B limit, estimate {estimated_ms:.0}ms"
                    ),
                ),
                Some(limit) => (
                    false,
                    format!(
                        "{kind}: working set {working_set:.0}B exceeds {limit}B memory limit"
                    ),
                ),
            };

            BackendCandidate {
                kind,
                estimated_ms,
                feasible,
                reason,
            }
        })
        .collect()
}

/// Select the cheapest feasible backend, ties broken in `BackendKind::ALL` order.
pub fn select_backend(
    bytes_scanned: u64,
    features: &Features,
    limits: &MemoryLimits,
) -> Result<BackendCandidate> {
    let candidates = score_candidates(bytes_scanned, features, limits);
    candidates
        .into_iter()
        .filter(|c| c.feasible)
        .min_by(|a, b| {
            a.estimated_ms
                .partial_cmp(&b.estimated_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .context(NoFeasibleBackendSnafu {
            reason: "every backend's working set exceeds its memory limit".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(complexity: u32, selectivity: f64) -> Features {
        Features {
            complexity,
            selectivity,
            ..Features::default()
        }
    }

    #[test]
    fn small_scan_prefers_vectorized() {
        let limits = MemoryLimits::default();
        let candidate = select_backend(10_000_000, &features(0, 1.0), &limits).unwrap();
        assert_eq!(candidate.kind, BackendKind::Vectorized);
    }

    #[test]
    fn oversized_scan_falls_back_past_vectorized() {
        let limits = MemoryLimits::default();
        let huge = limits.vectorized * 10;
        let candidate = select_backend(huge, &features(0, 1.0), &limits).unwrap();
        assert_ne!(candidate.kind, BackendKind::Vectorized);
    }

    #[test]
    fn no_feasible_backend_when_even_distributed_limit_set() {
        // Distributed has no memory ceiling, so this always succeeds; assert the ranking instead
        // covers the infeasible-candidate path via the vectorized/parallel candidates' flags.
        let limits = MemoryLimits {
            vectorized: 1,
            parallel: 1,
            distributed_nodes: 1,
        };
        let candidates = score_candidates(1_000_000_000, &features(0, 1.0), &limits);
        assert!(!candidates[0].feasible);
        assert!(!candidates[1].feasible);
        assert!(candidates[2].feasible);
    }

    #[test]
    fn selector_is_deterministic() {
        let limits = MemoryLimits::default();
        let a = select_backend(5_000_000, &features(4, 0.2), &limits).unwrap();
        let b = select_backend(5_000_000, &features(4, 0.2), &limits).unwrap();
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.estimated_ms, b.estimated_ms);
    }
}
