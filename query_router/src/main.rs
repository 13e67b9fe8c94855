//! The `query_router` CLI binary (spec.md §6 command surface).
//!
//! A thin wrapper over [`query_router::Engine`]: each subcommand registers a single table rooted
//! at a directory, runs one query, and reports the outcome. There is no persistent server here —
//! every invocation builds a fresh engine, mirroring the teacher's `influxdb_iox` subcommand
//! dispatch (`commands/run/mod.rs`) without the long-running service loop.

use clap::Parser;
use query_router::cache::CacheStats;
use query_router::cancellation::CancellationToken;
use query_router::clock::SystemClock;
use query_router::config::Config;
use query_router::engine::{Engine, ExecutionRequest, Executor, ExecutorError, ExecutorResult};
use query_router::sql::Dialect;
use query_router::Catalog;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// A cost-based SQL query router over partitioned columnar files.
#[derive(Debug, Parser)]
#[clap(name = "query_router", version)]
struct Cli {
    /// Table registrations, `name=root_dir`; may be repeated.
    #[clap(long = "table", global = true, env = "QUERY_ROUTER_TABLES")]
    tables: Vec<TableArg>,

    /// Dialect to parse queries under.
    #[clap(long, global = true, env = "QUERY_ROUTER_DIALECT", default_value = "generic")]
    dialect: String,

    /// Cache capacity (max live entries).
    #[clap(long, global = true, env = "QUERY_ROUTER_CACHE_MAX_ENTRIES", default_value_t = 100)]
    cache_max_entries: usize,

    /// Cache TTL in milliseconds; `0` disables expiry.
    #[clap(long, global = true, env = "QUERY_ROUTER_CACHE_TTL_MS", default_value_t = 3_600_000)]
    cache_ttl_ms: i64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct TableArg {
    name: String,
    root: PathBuf,
}

impl std::str::FromStr for TableArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, root) = s
            .split_once('=')
            .ok_or_else(|| format!("expected name=path, got '{s}'"))?;
        Ok(TableArg {
            name: name.to_string(),
            root: PathBuf::from(root),
        })
    }
}

#[derive(Debug, Parser)]
enum Command {
    /// Run a query and print its result rows.
    Execute {
        /// The SQL text to run.
        sql: String,
    },
    /// Print the scan plan and backend ranking without executing.
    Explain {
        /// The SQL text to analyze.
        sql: String,
    },
    /// Print cache effectiveness stats. Always a fresh, empty cache for a one-shot process.
    CacheStats,
    /// Clear the cache. A no-op for a one-shot process; kept for command-surface parity (spec.md §6).
    CacheClear,
    /// Run a query `iterations` times and report min/median/max wall time.
    Benchmark {
        /// The SQL text to run repeatedly.
        sql: String,
        /// Number of iterations.
        #[clap(long, default_value_t = 10)]
        iterations: usize,
    },
}

/// A no-op executor: returns zero rows immediately. Stands in until a real backend (DataFusion,
/// a distributed query service, ...) is wired in by an embedder of this crate.
#[derive(Debug, Default)]
struct NullExecutor;

impl Executor for NullExecutor {
    fn execute(&self, _request: &ExecutionRequest) -> Result<ExecutorResult, ExecutorError> {
        Ok(ExecutorResult::default())
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    run(cli)
}

/// Install a `tracing` subscriber so the engine's `#[instrument]` spans and `debug!`/`info!`/
/// `warn!` events (pipeline analyze/prune/cache/select/dispatch boundaries) are actually emitted.
/// Filter is read from `RUST_LOG`, defaulting to `warn`.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> ExitCode {
    let dialect = match cli.dialect.parse::<Dialect>() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let catalog = Arc::new(Catalog::new());
    for table in &cli.tables {
        if let Err(e) = catalog.register(table.name.clone(), table.root.clone(), None) {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    }

    let config = Config::new()
        .with_cache_max_entries(cli.cache_max_entries)
        .with_cache_ttl_ms(cli.cache_ttl_ms)
        .with_default_dialect(dialect);

    let engine = Engine::new(
        catalog,
        Arc::new(NullExecutor),
        config.cache.max_entries,
        config.cache.ttl_ms,
        config.selector.memory_limits,
        config.default_dialect,
        Arc::new(SystemClock),
    );
    let cancellation = CancellationToken::new();

    match cli.command {
        Command::Execute { sql } => execute(&engine, &sql, &cancellation),
        Command::Explain { sql } => explain(&engine, &sql),
        Command::CacheStats => {
            print_stats(&engine.cache_stats());
            ExitCode::SUCCESS
        }
        Command::CacheClear => {
            engine.cache_clear();
            ExitCode::SUCCESS
        }
        Command::Benchmark { sql, iterations } => benchmark(&engine, &sql, iterations, &cancellation),
    }
}

fn execute(engine: &Engine, sql: &str, cancellation: &CancellationToken) -> ExitCode {
    match engine.execute(sql, cancellation) {
        Ok(outcome) => {
            println!(
                "backend={} from_cache={} rows={} rows_processed={}",
                outcome.backend,
                outcome.from_cache,
                outcome.result.rows.len(),
                outcome.result.rows_processed
            );
            for row in &outcome.result.rows {
                let rendered: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", rendered.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

fn explain(engine: &Engine, sql: &str) -> ExitCode {
    match engine.explain(sql) {
        Ok(report) => {
            println!("canonical: {}", report.canonical_text);
            println!(
                "scan: {} / {} partitions ({:.1}% pruned), {} bytes",
                report.scan_plan.partitions_scanned,
                report.scan_plan.partitions_total,
                report.scan_plan.fraction_pruned * 100.0,
                report.scan_plan.total_bytes
            );
            for candidate in &report.candidates {
                println!(
                    "  {:<12} estimated_ms={:<10.1} feasible={:<5} {}",
                    candidate.kind.to_string(),
                    candidate.estimated_ms,
                    candidate.feasible,
                    candidate.reason
                );
            }
            println!("selected: {}", report.selected);
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

fn benchmark(engine: &Engine, sql: &str, iterations: usize, cancellation: &CancellationToken) -> ExitCode {
    let mut timings: Vec<Duration> = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        if let Err(e) = engine.execute(sql, cancellation) {
            return report_error(&e);
        }
        timings.push(start.elapsed());
    }
    timings.sort();
    let min = timings.first().copied().unwrap_or_default();
    let max = timings.last().copied().unwrap_or_default();
    let median = timings.get(timings.len() / 2).copied().unwrap_or_default();
    println!(
        "iterations={iterations} min={min:?} median={median:?} max={max:?}"
    );
    ExitCode::SUCCESS
}

fn print_stats(stats: &CacheStats) {
    println!(
        "size={} capacity={} hits={} misses={} hit_rate={:.3} evictions={} expirations={} stale_invalidations={}",
        stats.size,
        stats.capacity,
        stats.hits,
        stats.misses,
        stats.hit_rate,
        stats.evictions,
        stats.expirations,
        stats.stale_invalidations
    );
}

fn report_error(err: &query_router::engine::Error) -> ExitCode {
    use query_router::engine::Error;
    eprintln!("{err}");
    match err {
        Error::Sql { .. } => ExitCode::from(2),
        Error::Partition { .. } => ExitCode::from(3),
        Error::Cost { .. } | Error::Executor { .. } => ExitCode::from(4),
        Error::Cancelled => ExitCode::from(130),
    }
}
