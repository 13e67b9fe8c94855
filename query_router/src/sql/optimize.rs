//! Logical rewrites applied before canonicalization (spec.md §4.1).
//!
//! Order: constant folding, predicate pushdown to scans, projection pruning, removal of
//! trivially true/false branches, flattening of conjunctions, `NOT` de Morgan normalization.
//! The whole pass is idempotent: each rewrite is a bottom-up fixed point over the expression it
//! touches, so re-running `optimize` on its own output is a no-op.

use super::ast::{BinOp, Expr, SelectStatement, Statement};
use crate::literal::Literal;

/// Apply the full rewrite pipeline to a parsed statement.
pub fn optimize(stmt: Statement) -> Statement {
    match stmt {
        Statement::Select(select) => Statement::Select(optimize_select(select)),
    }
}

fn optimize_select(mut select: SelectStatement) -> SelectStatement {
    // Predicate pushdown to scans: in this single-scan-per-table model the WHERE clause is
    // already attached to its scan (there is no separate relational-algebra tree to push
    // through), so this step is the identity here; the pruner (spec.md §4.2) is what actually
    // applies these predicates to partitions.
    select.selection = select.selection.map(rewrite_expr);
    select.having = select.having.map(rewrite_expr);
    select.group_by = select.group_by.into_iter().map(rewrite_expr).collect();

    // Projection pruning: drop exact duplicate projected expressions, keeping the first.
    let mut seen = Vec::new();
    select.projection.retain(|item| {
        if seen.contains(&item.expr) {
            false
        } else {
            seen.push(item.expr.clone());
            true
        }
    });

    select
}

/// Bottom-up rewrite: fold children first, then apply node-local rules. Doing this in one
/// post-order pass is what makes the whole pipeline idempotent without an explicit fixed-point
/// loop, since any simplification a rule enables in a parent is already visible by the time the
/// parent is rewritten.
fn rewrite_expr(expr: Expr) -> Expr {
    let expr = recurse(expr);
    let expr = push_not_inward(expr);
    let expr = fold_constants(expr);
    flatten_trivial(expr)
}

fn recurse(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(rewrite_expr(*left)),
            op,
            right: Box::new(rewrite_expr(*right)),
        },
        Expr::Not(inner) => Expr::Not(Box::new(rewrite_expr(*inner))),
        Expr::IsNull(inner) => Expr::IsNull(Box::new(rewrite_expr(*inner))),
        Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(rewrite_expr(*inner))),
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(rewrite_expr(*expr)),
            list: list.into_iter().map(rewrite_expr).collect(),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(rewrite_expr(*expr)),
            low: Box::new(rewrite_expr(*low)),
            high: Box::new(rewrite_expr(*high)),
            negated,
        },
        Expr::Function {
            name,
            args,
            distinct,
            is_window,
        } => Expr::Function {
            name,
            args: args.into_iter().map(rewrite_expr).collect(),
            distinct,
            is_window,
        },
        other => other,
    }
}

/// `NOT` de Morgan normalization: push `NOT` towards the leaves.
fn push_not_inward(expr: Expr) -> Expr {
    match expr {
        Expr::Not(inner) => match *inner {
            Expr::Not(doubly_inner) => *doubly_inner,
            Expr::BinaryOp {
                left,
                op: BinOp::And,
                right,
            } => Expr::BinaryOp {
                left: Box::new(push_not_inward(Expr::Not(left))),
                op: BinOp::Or,
                right: Box::new(push_not_inward(Expr::Not(right))),
            },
            Expr::BinaryOp {
                left,
                op: BinOp::Or,
                right,
            } => Expr::BinaryOp {
                left: Box::new(push_not_inward(Expr::Not(left))),
                op: BinOp::And,
                right: Box::new(push_not_inward(Expr::Not(right))),
            },
            Expr::BinaryOp {
                left,
                op: BinOp::Eq,
                right,
            } => Expr::BinaryOp {
                left,
                op: BinOp::NotEq,
                right,
            },
            Expr::BinaryOp {
                left,
                op: BinOp::NotEq,
                right,
            } => Expr::BinaryOp {
                left,
                op: BinOp::Eq,
                right,
            },
            Expr::IsNull(e) => Expr::IsNotNull(e),
            Expr::IsNotNull(e) => Expr::IsNull(e),
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr,
                list,
                negated: !negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr,
                low,
                high,
                negated: !negated,
            },
            other => Expr::Not(Box::new(other)),
        },
        other => other,
    }
}

/// Fold expressions over only literal operands.
fn fold_constants(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { left, op, right } => match (&*left, &*right) {
            (Expr::Literal(a), Expr::Literal(b)) => match fold_literal_op(a, op, b) {
                Some(lit) => Expr::Literal(lit),
                None => Expr::BinaryOp { left, op, right },
            },
            _ => Expr::BinaryOp { left, op, right },
        },
        other => other,
    }
}

fn fold_literal_op(a: &Literal, op: BinOp, b: &Literal) -> Option<Literal> {
    use std::cmp::Ordering::*;
    let cmp = a.partial_cmp(b);
    let result = match op {
        BinOp::Eq => Some(a == b),
        BinOp::NotEq => Some(a != b),
        BinOp::Lt => cmp.map(|o| o == Less),
        BinOp::LtEq => cmp.map(|o| o != std::cmp::Ordering::Greater),
        BinOp::Gt => cmp.map(|o| o == std::cmp::Ordering::Greater),
        BinOp::GtEq => cmp.map(|o| o != Less),
        BinOp::And => match (a, b) {
            (Literal::Boolean(x), Literal::Boolean(y)) => Some(*x && *y),
            _ => None,
        },
        BinOp::Or => match (a, b) {
            (Literal::Boolean(x), Literal::Boolean(y)) => Some(*x || *y),
            _ => None,
        },
    };
    result.map(Literal::Boolean)
}

/// Remove trivially true/false branches of `AND`/`OR`.
fn flatten_trivial(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinOp::And,
            right,
        } => match (is_bool(&left), is_bool(&right)) {
            (Some(false), _) | (_, Some(false)) => Expr::Literal(Literal::Boolean(false)),
            (Some(true), _) => *right,
            (_, Some(true)) => *left,
            _ => Expr::BinaryOp {
                left,
                op: BinOp::And,
                right,
            },
        },
        Expr::BinaryOp {
            left,
            op: BinOp::Or,
            right,
        } => match (is_bool(&left), is_bool(&right)) {
            (Some(true), _) | (_, Some(true)) => Expr::Literal(Literal::Boolean(true)),
            (Some(false), _) => *right,
            (_, Some(false)) => *left,
            _ => Expr::BinaryOp {
                left,
                op: BinOp::Or,
                right,
            },
        },
        other => other,
    }
}

fn is_bool(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(Literal::Boolean(b)) => Some(*b),
        _ => None,
    }
}

/// Flatten a right- or left-nested chain of `AND`s into its leaf conjuncts, in left-to-right
/// order. Used by the canonicalizer (spec.md §4.1 rule (b)) and by predicate extraction.
pub fn flatten_conjuncts(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinOp::And,
            right,
        } => {
            let mut out = flatten_conjuncts(left);
            out.extend(flatten_conjuncts(right));
            out
        }
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse, Dialect};

    fn optimize_sql(sql: &str) -> Statement {
        optimize(parse(sql, Dialect::Generic).unwrap())
    }

    #[test]
    fn optimize_is_idempotent() {
        let once = optimize_sql(
            "SELECT a FROM t WHERE NOT (a = 1 AND b = 2) AND (1 = 1)",
        );
        let twice = optimize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn removes_trivially_true_conjunct() {
        let Statement::Select(select) = optimize_sql("SELECT a FROM t WHERE a = 1 AND 1 = 1") else {
            panic!("expected select")
        };
        // `1 = 1` folds to TRUE and is then dropped by the trivial-branch rule.
        assert_eq!(select.selection, Some(Expr::BinaryOp {
            left: Box::new(Expr::Column { table: None, name: "a".into() }),
            op: BinOp::Eq,
            right: Box::new(Expr::Literal(Literal::Integer(1))),
        }));
    }

    #[test]
    fn de_morgan_pushes_not_through_and() {
        let Statement::Select(select) = optimize_sql("SELECT a FROM t WHERE NOT (a = 1 AND b = 2)") else {
            panic!("expected select")
        };
        match select.selection.unwrap() {
            Expr::BinaryOp { op: BinOp::Or, .. } => {}
            other => panic!("expected OR at top level, got {other:?}"),
        }
    }
}
