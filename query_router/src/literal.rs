//! [`Literal`] — a tagged scalar value used by predicates, partition keys, and query results.

use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::fmt;

/// A scalar literal, tagged by type. Comparison (`partial_cmp`) is only meaningful within a
/// matching tag; cross-tag comparisons return `None`, which callers surface as an opaque
/// (`Predicate::Other`) rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// A boolean.
    Boolean(bool),
    /// A UTF-8 string.
    String(String),
    /// Days since the Unix epoch (1970-01-01).
    Date(i32),
    /// Nanoseconds since the Unix epoch.
    TimestampNanos(i64),
    /// SQL `NULL`.
    Null,
}

impl Literal {
    /// The logical type name this literal carries, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "int64",
            Literal::Float(_) => "float64",
            Literal::Boolean(_) => "bool",
            Literal::String(_) => "string",
            Literal::Date(_) => "date",
            Literal::TimestampNanos(_) => "timestamp_ns",
            Literal::Null => "null",
        }
    }

    /// Parse a partition-directory value string into the tag implied by `like`.
    ///
    /// Partition values on disk are always strings (e.g. `date=2024-11-01`); this reshapes that
    /// string into the same [`Literal`] variant as the predicate it's being compared against, per
    /// spec.md §4.2's typed-parse rule. Returns `None` on parse failure, which the pruner treats
    /// as a conservative retain plus a `type_coercion_warning`.
    pub fn parse_as(raw: &str, like: &Literal) -> Option<Literal> {
        match like {
            Literal::Integer(_) => raw.parse::<i64>().ok().map(Literal::Integer),
            Literal::Float(_) => raw.parse::<f64>().ok().map(Literal::Float),
            Literal::Boolean(_) => raw.parse::<bool>().ok().map(Literal::Boolean),
            Literal::String(_) => Some(Literal::String(raw.to_string())),
            Literal::Date(_) => parse_date(raw).map(Literal::Date),
            Literal::TimestampNanos(_) => raw.parse::<i64>().ok().map(Literal::TimestampNanos),
            Literal::Null => None,
        }
    }
}

/// Parse a `YYYY-MM-DD` date string into days since the Unix epoch.
pub fn parse_date(raw: &str) -> Option<i32> {
    let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some((parsed - epoch).num_days() as i32)
}

/// Render days-since-epoch back into `YYYY-MM-DD`, the canonical spelling (spec.md §4.1).
pub fn format_date(days: i32) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    let date = epoch + chrono::Duration::days(days as i64);
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Literal::Integer(a), Literal::Integer(b)) => a.partial_cmp(b),
            (Literal::Float(a), Literal::Float(b)) => a.partial_cmp(b),
            (Literal::Boolean(a), Literal::Boolean(b)) => a.partial_cmp(b),
            (Literal::String(a), Literal::String(b)) => a.partial_cmp(b),
            (Literal::Date(a), Literal::Date(b)) => a.partial_cmp(b),
            (Literal::TimestampNanos(a), Literal::TimestampNanos(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Boolean(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Literal::Date(days) => write!(f, "{}", format_date(*days)),
            Literal::TimestampNanos(ns) => write!(f, "{ns}"),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_roundtrip() {
        let days = parse_date("2024-11-07").unwrap();
        assert_eq!(format_date(days), "2024-11-07");
    }

    #[test]
    fn cross_tag_comparison_is_none() {
        let a = Literal::Integer(1);
        let b = Literal::String("1".into());
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn parse_as_matches_requested_tag() {
        let like = Literal::Date(0);
        let parsed = Literal::parse_as("2024-11-01", &like).unwrap();
        assert_eq!(parsed, Literal::Date(parse_date("2024-11-01").unwrap()));
    }

    #[test]
    fn string_literal_doubles_internal_quotes() {
        let lit = Literal::String("O'Brien".into());
        assert_eq!(lit.to_string(), "'O''Brien'");
    }
}
