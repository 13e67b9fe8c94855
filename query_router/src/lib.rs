//! A cost-based SQL query router over partitioned columnar files (spec.md §1).
//!
//! Parses and analyzes a query against a [`catalog::Catalog`], prunes partitions via
//! [`partition::PartitionIndex`] and [`pruner`], scores candidate backends with [`cost`], and
//! caches results in a [`cache::ResultCache`] keyed by canonical text plus an mtime witness.
//! [`engine::Engine`] wires these stages together; callers supply the actual execution backend
//! through the [`engine::Executor`] trait.

#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod backoff;
pub mod cache;
pub mod cancellation;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod cost;
pub mod engine;
pub mod literal;
pub mod partition;
pub mod predicate;
pub mod pruner;
pub mod schema;
pub mod sql;

pub use cancellation::CancellationToken;
pub use catalog::Catalog;
pub use config::Config;
pub use engine::{Engine, Executor, ExecutorError, ExecutorResult};
pub use sql::Dialect;
