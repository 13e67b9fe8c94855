//! [`Engine`] — the orchestrator tying every subsystem together (spec.md §4.5).

use super::executor::{ExecutionRequest, Executor, ExecutorError, ExecutorResult};
use crate::backoff::{Backoff, BackoffConfig};
use crate::cache::{Lookup, ResultCache};
use crate::cancellation::CancellationToken;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::cost::{self, BackendCandidate, BackendKind, MemoryLimits};
use crate::partition::PartitionIndex;
use crate::pruner::{self, ScanPlan};
use crate::sql::{self, ast::Statement, AnalyzedQuery, Dialect};
use parking_lot::Mutex;
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The outcome of [`Engine::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// The execution result.
    pub result: ExecutorResult,
    /// Whether this came from the result cache.
    pub from_cache: bool,
    /// The backend that produced (or would have produced) `result`.
    pub backend: BackendKind,
}

/// The outcome of [`Engine::explain`]: the same analysis and ranking Execute would use, without
/// dispatching to the executor or touching the cache (spec.md §4.5, property 9).
#[derive(Debug, Clone)]
pub struct ExplainReport {
    /// Deterministic canonical text, the cache key's text component.
    pub canonical_text: String,
    /// The computed scan plan.
    pub scan_plan: ScanPlan,
    /// Every backend's cost-model candidacy, in `BackendKind::ALL` order.
    pub candidates: Vec<BackendCandidate>,
    /// The backend Execute would dispatch to.
    pub selected: BackendKind,
}

/// Errors raised by the engine pipeline (spec.md §7).
#[derive(Debug, Snafu)]
pub enum Error {
    /// Analysis (parse/resolve/optimize/canonicalize) failed.
    #[snafu(display("{source}"))]
    Sql { source: sql::Error },

    /// Building or refreshing a table's partition index failed.
    #[snafu(display("{source}"))]
    Partition { source: crate::partition::Error },

    /// No backend could feasibly run this scan.
    #[snafu(display("{source}"))]
    Cost { source: cost::Error },

    /// The executor reported a non-retryable error.
    #[snafu(display("{source}"))]
    Executor { source: ExecutorError },

    /// The call was cancelled; nothing was written to the cache.
    #[snafu(display("query was cancelled"))]
    Cancelled,
}

/// Result alias for the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A cached result plus the backend that produced it, so a cache hit can report the original
/// `BackendKind` instead of a guess (spec.md §4.4; `QueryOutcome.backend`).
#[derive(Debug, Clone, PartialEq)]
struct CachedResult {
    result: ExecutorResult,
    backend: BackendKind,
}

/// The query router's orchestrator: owns the catalog, per-table partition indexes, the result
/// cache, and dispatches to a pluggable [`Executor`] (spec.md §4.5, §5).
pub struct Engine {
    catalog: Arc<Catalog>,
    indexes: Mutex<HashMap<String, Arc<PartitionIndex>>>,
    cache: ResultCache<CachedResult>,
    executor: Arc<dyn Executor>,
    memory_limits: MemoryLimits,
    dialect: Dialect,
}

impl Engine {
    /// Construct an engine over `catalog`, dispatching to `executor`.
    pub fn new(
        catalog: Arc<Catalog>,
        executor: Arc<dyn Executor>,
        cache_max_entries: usize,
        cache_ttl_ms: i64,
        memory_limits: MemoryLimits,
        dialect: Dialect,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            indexes: Mutex::new(HashMap::new()),
            cache: ResultCache::new(cache_max_entries, cache_ttl_ms, clock),
            executor,
            memory_limits,
            dialect,
        }
    }

    /// Current cache effectiveness snapshot.
    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result.
    pub fn cache_clear(&self) {
        self.cache.invalidate(|_| true);
    }

    /// Run the full Execute pipeline (spec.md §4.5 steps 1-8).
    #[instrument(skip(self, cancellation))]
    pub fn execute(&self, sql_text: &str, cancellation: &CancellationToken) -> Result<QueryOutcome> {
        let analyzed = sql::analyze(sql_text, self.dialect, &self.catalog).context(SqlSnafu)?;
        check_cancelled(cancellation)?;

        let scan_plan = self.build_scan_plan(&analyzed)?;
        check_cancelled(cancellation)?;

        let witness_paths = scan_plan.witness_paths();
        let witness_mtime = scan_plan.max_mtime_ns();
        if let Lookup::Hit(cached) = self
            .cache
            .get(&analyzed.canonical_text, &witness_paths, witness_mtime)
        {
            debug!(canonical = %analyzed.canonical_text, backend = %cached.backend, "cache hit");
            return Ok(QueryOutcome {
                result: cached.result,
                from_cache: true,
                backend: cached.backend,
            });
        }
        check_cancelled(cancellation)?;

        let candidates = cost::score_candidates(scan_plan.total_bytes, &analyzed.features, &self.memory_limits);
        let Statement::Select(select) = &analyzed.statement else {
            unreachable!("Statement has only the Select variant")
        };
        let schemas = self.schemas_for(&analyzed.tables);

        let (result, backend) = self.dispatch_with_retry(&candidates, select, &scan_plan, &schemas, cancellation)?;

        check_cancelled(cancellation)?;
        self.cache.put(
            &analyzed.canonical_text,
            &witness_paths,
            witness_mtime,
            CachedResult {
                result: result.clone(),
                backend,
            },
        );

        Ok(QueryOutcome {
            result,
            from_cache: false,
            backend,
        })
    }

    /// Run analysis, pruning and backend selection without dispatching to the executor or
    /// touching the cache (spec.md §4.5 Explain mode, property 9).
    #[instrument(skip(self))]
    pub fn explain(&self, sql_text: &str) -> Result<ExplainReport> {
        let analyzed = sql::analyze(sql_text, self.dialect, &self.catalog).context(SqlSnafu)?;
        let scan_plan = self.build_scan_plan(&analyzed)?;
        let candidates = cost::score_candidates(scan_plan.total_bytes, &analyzed.features, &self.memory_limits);
        let selected = cost::select_backend(scan_plan.total_bytes, &analyzed.features, &self.memory_limits)
            .context(CostSnafu)?
            .kind;

        Ok(ExplainReport {
            canonical_text: analyzed.canonical_text,
            scan_plan,
            candidates,
            selected,
        })
    }

    fn build_scan_plan(&self, analyzed: &AnalyzedQuery) -> Result<ScanPlan> {
        let mut plan = ScanPlan::default();
        for table in &analyzed.tables {
            let index = self.index_for(table)?;
            let predicates = analyzed
                .predicates_by_table
                .get(table)
                .cloned()
                .unwrap_or_default();
            pruner::prune_table(table, &index, &predicates, &mut plan);
        }
        for warning in &plan.warnings {
            warn!("{warning}");
        }
        Ok(plan)
    }

    /// Build or refresh the partition index for `table`, per spec.md §4.5 step 2 and §5's
    /// idempotent-rebuild guarantee.
    fn index_for(&self, table: &str) -> Result<Arc<PartitionIndex>> {
        let entry = self.catalog.table(table).ok();
        let root = entry
            .map(|t| t.root().to_path_buf())
            .unwrap_or_else(|| Path::new(table).to_path_buf());

        let mut indexes = self.indexes.lock();
        if let Some(existing) = indexes.get(table) {
            if !existing.is_stale(&root).context(PartitionSnafu)? {
                return Ok(Arc::clone(existing));
            }
        }
        let rebuilt = Arc::new(PartitionIndex::build(&root).context(PartitionSnafu)?);
        indexes.insert(table.to_string(), Arc::clone(&rebuilt));
        Ok(rebuilt)
    }

    fn schemas_for(&self, tables: &[String]) -> HashMap<String, crate::schema::Schema> {
        tables
            .iter()
            .filter_map(|name| {
                let table = self.catalog.table(name).ok()?;
                table.schema().cloned().map(|schema| (name.clone(), schema))
            })
            .collect()
    }

    /// Dispatch to the cheapest feasible candidate; on a retryable `ExecutorError`, degrade to
    /// the next-cheapest feasible candidate and retry exactly once (spec.md §4.5 step 8, §7).
    fn dispatch_with_retry(
        &self,
        candidates: &[BackendCandidate],
        statement: &crate::sql::ast::SelectStatement,
        scan_plan: &ScanPlan,
        schemas: &HashMap<String, crate::schema::Schema>,
        cancellation: &CancellationToken,
    ) -> Result<(ExecutorResult, BackendKind)> {
        let mut ranked: Vec<&BackendCandidate> = candidates.iter().filter(|c| c.feasible).collect();
        ranked.sort_by(|a, b| {
            a.estimated_ms
                .partial_cmp(&b.estimated_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let Some(&first) = ranked.first() else {
            return cost::NoFeasibleBackendSnafu {
                reason: "every backend's working set exceeds its memory limit".to_string(),
            }
            .fail()
            .context(CostSnafu);
        };

        check_cancelled(cancellation)?;
        match self.dispatch(first.kind, statement, scan_plan, schemas) {
            Ok(result) => Ok((result, first.kind)),
            Err(e) if e.is_retryable() => {
                info!(backend = %first.kind, error = %e, "degrading to next backend after retryable error");
                match ranked.get(1).copied() {
                    Some(next) => {
                        std::thread::sleep(Backoff::new(BackoffConfig::default()).next());
                        check_cancelled(cancellation)?;
                        let result = self
                            .dispatch(next.kind, statement, scan_plan, schemas)
                            .context(ExecutorSnafu)?;
                        Ok((result, next.kind))
                    }
                    None => Err(Error::Executor { source: e }),
                }
            }
            Err(e) => Err(Error::Executor { source: e }),
        }
    }

    fn dispatch(
        &self,
        backend: BackendKind,
        statement: &crate::sql::ast::SelectStatement,
        scan_plan: &ScanPlan,
        schemas: &HashMap<String, crate::schema::Schema>,
    ) -> std::result::Result<ExecutorResult, ExecutorError> {
        let files = scan_plan.all_files().into_iter().cloned().collect();
        let request = ExecutionRequest {
            statement: statement.clone(),
            files,
            schemas: schemas.clone(),
            backend,
            deadline: None,
        };
        self.executor.execute(&request)
    }
}

fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        return CancelledSnafu.fail();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::fs::{self, File};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    impl Executor for CountingExecutor {
        fn execute(&self, _request: &ExecutionRequest) -> std::result::Result<ExecutorResult, ExecutorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecutorResult {
                rows: vec![vec![crate::literal::Literal::Integer(1)]],
                rows_processed: 7,
                wall_time: std::time::Duration::from_millis(1),
            })
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    fn build_sales(root: &Path) {
        for day in 1..=30 {
            touch(&root.join(format!("date=2024-11-{day:02}/part.parquet")));
        }
    }

    fn engine_with(root: &Path, executor: Arc<CountingExecutor>) -> Engine {
        let catalog = Arc::new(Catalog::new());
        catalog.register("sales", root, None).unwrap();
        Engine::new(
            catalog,
            executor,
            100,
            0,
            MemoryLimits::default(),
            Dialect::Generic,
            Arc::new(SystemClock),
        )
    }

    const SALES_QUERY: &str =
        "SELECT region, SUM(amount) FROM sales WHERE date >= '2024-11-01' AND date <= '2024-11-07' GROUP BY region";

    #[test]
    fn s1_execute_prunes_and_dispatches() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), Arc::clone(&executor));

        let outcome = engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        assert!(!outcome.from_cache);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn s2_second_call_is_a_cache_hit() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), Arc::clone(&executor));

        let first = engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        let second = engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.result, first.result);
        assert_eq!(second.backend, first.backend);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn s3_reordered_conjuncts_hit_the_same_cache_entry() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), Arc::clone(&executor));

        engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        let reordered = "SELECT region, SUM(amount) FROM sales WHERE date <= '2024-11-07' AND date >= '2024-11-01' GROUP BY region";
        let outcome = engine.execute(reordered, &CancellationToken::new()).unwrap();
        assert!(outcome.from_cache);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn s4_touching_a_witness_file_invalidates_the_cache_entry() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), Arc::clone(&executor));

        engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        let touched = dir.path().join("date=2024-11-03/part.parquet");
        let now = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        File::create(&touched).unwrap();
        filetime_touch(&touched, now);

        let outcome = engine.execute(SALES_QUERY, &CancellationToken::new()).unwrap();
        assert!(!outcome.from_cache);
        assert_eq!(engine.cache_stats().stale_invalidations, 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    fn filetime_touch(path: &Path, time: std::time::SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(time).ok();
    }

    #[test]
    fn s6_explain_never_calls_the_executor_or_mutates_the_cache() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), executor.clone());

        let report = engine.explain(SALES_QUERY).unwrap();
        assert_eq!(report.scan_plan.partitions_scanned, 7);
        assert_eq!(report.scan_plan.partitions_total, 30);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.cache_stats().size, 0);
    }

    #[test]
    fn cancellation_short_circuits_before_dispatch() {
        let dir = tempdir().unwrap();
        build_sales(dir.path());
        let executor = Arc::new(CountingExecutor::default());
        let engine = engine_with(dir.path(), Arc::clone(&executor));

        let token = CancellationToken::new();
        token.cancel();
        let err = engine.execute(SALES_QUERY, &token).unwrap_err();
        assert_matches!(err, Error::Cancelled);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
