//! [`Predicate`] — a normalized conjunct extracted from a query's `WHERE` clause (spec.md §3).

use crate::literal::Literal;

/// A single normalized predicate conjunct.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = literal`.
    Eq(String, Literal),
    /// `column != literal`.
    Neq(String, Literal),
    /// `column BETWEEN lo AND hi`, either bound optional, each independently inclusive/exclusive.
    Range {
        /// Column name.
        column: String,
        /// Lower bound, if present.
        lo: Option<Literal>,
        /// Upper bound, if present.
        hi: Option<Literal>,
        /// Whether `lo` is inclusive.
        lo_inclusive: bool,
        /// Whether `hi` is inclusive.
        hi_inclusive: bool,
    },
    /// `column IN (...)`.
    In(String, Vec<Literal>),
    /// `column IS NULL`.
    IsNull(String),
    /// `column IS NOT NULL`.
    IsNotNull(String),
    /// Anything that doesn't reduce to the above: multi-column, subquery, or function
    /// predicates. Preserved (for the executor) but opaque to pruning (spec.md §4.1).
    Other(String),
}

impl Predicate {
    /// The single column this predicate references, if any (`Other` has none).
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::Eq(c, _)
            | Predicate::Neq(c, _)
            | Predicate::Range { column: c, .. }
            | Predicate::In(c, _)
            | Predicate::IsNull(c)
            | Predicate::IsNotNull(c) => Some(c),
            Predicate::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_accessor() {
        let p = Predicate::Eq("region".into(), Literal::String("us".into()));
        assert_eq!(p.column(), Some("region"));
        assert_eq!(Predicate::Other("f(x) > 1".into()).column(), None);
    }
}
