//! The `Executor` contract (spec.md §4.5): external, backend-specific execution.
//!
//! This crate ships no executor implementation — it routes to one. Callers supply an
//! `Arc<dyn Executor>` (a DataFusion runtime, a distributed query service, a test double).

use crate::cost::BackendKind;
use crate::literal::Literal;
use crate::partition::FileDescriptor;
use crate::schema::Schema;
use crate::sql::ast::SelectStatement;
use std::collections::HashMap;
use std::time::Duration;

/// Everything a backend needs to run a single scan.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// The (qualified, optimized) statement to execute.
    pub statement: SelectStatement,
    /// Files surviving pruning, across every referenced table.
    pub files: Vec<FileDescriptor>,
    /// Declared schemas for every referenced table, keyed by table name.
    pub schemas: HashMap<String, Schema>,
    /// The backend chosen to run this request.
    pub backend: BackendKind,
    /// Optional wall-clock deadline; expiry surfaces as `ExecutorError::Timeout`.
    pub deadline: Option<Duration>,
}

/// A tabular result row, positional per `ExecutorResult`'s implied projection order.
pub type Row = Vec<Literal>;

/// Successful execution output (spec.md §4.5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorResult {
    /// Result rows.
    pub rows: Vec<Row>,
    /// Rows scanned before projection/filtering (for diagnostics, not necessarily `rows.len()`).
    pub rows_processed: u64,
    /// Backend-reported wall time.
    pub wall_time: Duration,
}

/// Errors a backend can report, classified per spec.md §7 for the engine's retry policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// A retryable resource shortage (e.g. thread pool exhaustion); triggers one backend
    /// degradation retry.
    TransientResource {
        /// Backend-reported detail.
        reason: String,
    },
    /// The backend ran out of memory executing this request; the attempted backend is marked
    /// infeasible for this call and the engine retries once against the next candidate.
    OutOfMemory {
        /// Backend-reported detail.
        reason: String,
    },
    /// A non-retryable failure (e.g. malformed data, backend bug).
    Permanent {
        /// Backend-reported detail.
        reason: String,
    },
    /// The request's deadline elapsed.
    Timeout,
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::TransientResource { reason } => {
                write!(f, "transient resource error: {reason}")
            }
            ExecutorError::OutOfMemory { reason } => write!(f, "out of memory: {reason}"),
            ExecutorError::Permanent { reason } => write!(f, "permanent executor error: {reason}"),
            ExecutorError::Timeout => write!(f, "executor deadline exceeded"),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl ExecutorError {
    /// Whether the engine should attempt a backend-degradation retry for this error
    /// (spec.md §7: `TransientResource` and `OutOfMemory` retry; `Permanent`/`Timeout` surface).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutorError::TransientResource { .. } | ExecutorError::OutOfMemory { .. }
        )
    }
}

/// A pluggable backend execution engine.
pub trait Executor: std::fmt::Debug + Send + Sync {
    /// Run `request`, returning rows or a classified error.
    fn execute(&self, request: &ExecutionRequest) -> Result<ExecutorResult, ExecutorError>;
}
