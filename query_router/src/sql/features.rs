//! Query-shape feature extraction feeding the cost model (spec.md §4.1, §4.3).

use super::ast::{Expr, SelectStatement, Statement};
use super::optimize::flatten_conjuncts;

/// Counts and heuristics describing the shape of a query, independent of any backend.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Features {
    /// Number of joined tables (not counting the primary `FROM`).
    pub joins: u32,
    /// Number of aggregate function calls in the projection/HAVING.
    pub aggregations: u32,
    /// Number of window function calls.
    pub windows: u32,
    /// Whether `SELECT DISTINCT` was used.
    pub distinct: bool,
    /// Number of `ORDER BY` items.
    pub order_by: u32,
    /// `LIMIT` value, if any.
    pub limit: Option<i64>,
    /// Estimated fraction of rows a single table's predicates retain, in `[0, 1]`.
    pub selectivity: f64,
    /// `joins*3 + aggregations*2 + windows*4 + distinct*1 + order_by*1` (spec.md §4.3).
    pub complexity: u32,
}

const AGGREGATE_NAMES: &[&str] = &["SUM", "COUNT", "AVG", "MIN", "MAX"];

/// Extract [`Features`] from an (already optimized) statement.
pub fn extract(stmt: &Statement) -> Features {
    match stmt {
        Statement::Select(select) => extract_select(select),
    }
}

fn extract_select(select: &SelectStatement) -> Features {
    let joins = select.joins.len() as u32;

    let mut aggregations = 0;
    let mut windows = 0;
    for item in &select.projection {
        count_calls(&item.expr, &mut aggregations, &mut windows);
    }
    if let Some(having) = &select.having {
        count_calls(having, &mut aggregations, &mut windows);
    }

    let order_by = select.order_by.len() as u32;
    let distinct = select.distinct;

    let selectivity = select
        .selection
        .as_ref()
        .map(selectivity_of)
        .unwrap_or(1.0);

    let complexity = joins * 3 + aggregations * 2 + windows * 4 + distinct as u32 + order_by;

    Features {
        joins,
        aggregations,
        windows,
        distinct,
        order_by,
        limit: select.limit,
        selectivity,
        complexity,
    }
}

fn count_calls(expr: &Expr, aggregations: &mut u32, windows: &mut u32) {
    match expr {
        Expr::Function {
            name,
            args,
            is_window,
            ..
        } => {
            if *is_window {
                *windows += 1;
            } else if AGGREGATE_NAMES.contains(&name.as_str()) {
                *aggregations += 1;
            }
            for arg in args {
                count_calls(arg, aggregations, windows);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            count_calls(left, aggregations, windows);
            count_calls(right, aggregations, windows);
        }
        Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            count_calls(inner, aggregations, windows)
        }
        Expr::InList { expr, list, .. } => {
            count_calls(expr, aggregations, windows);
            for item in list {
                count_calls(item, aggregations, windows);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            count_calls(expr, aggregations, windows);
            count_calls(low, aggregations, windows);
            count_calls(high, aggregations, windows);
        }
        _ => {}
    }
}

/// Per-conjunct selectivity heuristic (spec.md §4.3): `Eq -> 1/100`, `Range -> 1/10`,
/// `In(k) -> min(1, k/100)`, `IsNull -> 1/1000`, everything else (including opaque
/// and multi-column predicates) is treated as non-selective (`1`). Conjuncts (`AND`)
/// multiply; disjuncts (`OR`) add, clamped to `1`.
fn selectivity_of(expr: &Expr) -> f64 {
    match expr {
        Expr::BinaryOp {
            left: _,
            op: super::ast::BinOp::Or,
            right: _,
        } => selectivity_of_or(expr),
        _ => flatten_conjuncts(expr)
            .iter()
            .map(conjunct_selectivity)
            .product::<f64>(),
    }
}

fn selectivity_of_or(expr: &Expr) -> f64 {
    fn flatten_disjuncts(expr: &Expr) -> Vec<&Expr> {
        match expr {
            Expr::BinaryOp {
                left,
                op: super::ast::BinOp::Or,
                right,
            } => {
                let mut out = flatten_disjuncts(left);
                out.extend(flatten_disjuncts(right));
                out
            }
            other => vec![other],
        }
    }
    let sum: f64 = flatten_disjuncts(expr)
        .iter()
        .map(|e| selectivity_of(e))
        .sum();
    sum.min(1.0)
}

fn conjunct_selectivity(expr: &Expr) -> f64 {
    use super::ast::BinOp;
    match expr {
        Expr::BinaryOp {
            op: BinOp::Eq, ..
        } => 1.0 / 100.0,
        Expr::BinaryOp {
            op: BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq,
            ..
        } => 1.0 / 10.0,
        Expr::Between { .. } => 1.0 / 10.0,
        Expr::InList { list, negated: false, .. } => (list.len() as f64 / 100.0).min(1.0),
        Expr::IsNull(_) => 1.0 / 1000.0,
        Expr::BinaryOp {
            op: BinOp::Or, ..
        } => selectivity_of_or(expr),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{optimize, parse, Dialect};

    fn features_of(sql: &str) -> Features {
        extract(&optimize(parse(sql, Dialect::Generic).unwrap()))
    }

    #[test]
    fn counts_aggregations_and_complexity() {
        let f = features_of("SELECT region, SUM(amount), COUNT(*) FROM sales GROUP BY region ORDER BY region");
        assert_eq!(f.aggregations, 2);
        assert_eq!(f.order_by, 1);
        assert_eq!(f.complexity, 2 * 2 + 1);
    }

    #[test]
    fn eq_predicate_selectivity() {
        let f = features_of("SELECT a FROM t WHERE a = 1");
        assert!((f.selectivity - 0.01).abs() < 1e-9);
    }

    #[test]
    fn anded_predicates_multiply_selectivity() {
        let f = features_of("SELECT a FROM t WHERE a = 1 AND b = 2");
        assert!((f.selectivity - 0.0001).abs() < 1e-9);
    }

    #[test]
    fn join_adds_complexity() {
        let f = features_of("SELECT a FROM t JOIN u ON t.id = u.id");
        assert_eq!(f.joins, 1);
        assert_eq!(f.complexity, 3);
    }
}
