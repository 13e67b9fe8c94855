//! The SQL front-end: parse, optimize, canonicalize, feature-extract (spec.md §4.1).

mod analyze;
mod canonicalize;
mod features;
mod optimize;
mod parse;

pub mod ast;

pub use analyze::{analyze, AnalyzedQuery};
pub use canonicalize::canonicalize;
pub use features::Features;
pub use optimize::optimize;
pub use parse::parse;

use snafu::prelude::*;

/// The SQL dialect a query is parsed under. Only affects quoting/keyword nuances; the crate
/// otherwise accepts the intersection of supported dialects (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The ANSI-ish intersection dialect (default, spec.md §6 `default_dialect`).
    Generic,
    /// PostgreSQL-flavored quoting.
    Postgres,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Generic
    }
}

impl std::str::FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Dialect::Generic),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => UnsupportedDialectSnafu {
                dialect: other.to_string(),
            }
            .fail(),
        }
    }
}

/// Errors raised by the SQL front-end (spec.md §4.1).
#[derive(Debug, Snafu)]
pub enum Error {
    /// The text is not a syntactically valid statement.
    #[snafu(display("parse error at position {position}: {message}"))]
    Parse {
        /// Byte offset (best-effort) of the failure.
        position: usize,
        /// Parser-reported message.
        message: String,
    },

    /// The text parsed, but isn't a single `SELECT` (spec.md §4.1).
    #[snafu(display("unsupported statement: {message}"))]
    UnsupportedStatement {
        /// Description of what was rejected.
        message: String,
    },

    /// A referenced table isn't registered in the catalog.
    #[snafu(display("unknown table '{name}'"))]
    UnknownTable {
        /// The offending table name.
        name: String,
    },

    /// An unqualified column name matches more than one referenced table's schema.
    #[snafu(display("ambiguous column '{name}'"))]
    AmbiguousColumn {
        /// The offending column name.
        name: String,
    },

    /// `default_dialect`/per-call dialect name didn't match a supported dialect.
    #[snafu(display("unsupported dialect '{dialect}'"))]
    UnsupportedDialect {
        /// The dialect string that was rejected.
        dialect: String,
    },
}

/// Result alias for the SQL front-end.
pub type Result<T, E = Error> = std::result::Result<T, E>;
