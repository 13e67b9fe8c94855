//! Canonical text rendering (spec.md §4.1) — the backbone of cache hit-rate.
//!
//! Canonicalization must be a function of the rewrite equivalence class: any two statements that
//! differ only in whitespace, case, conjunct order, or parenthesization of associative operators
//! render to byte-identical text.

use super::ast::{Expr, Join, OrderByItem, SelectItem, SelectStatement, Statement, TableRef};
use super::optimize::flatten_conjuncts;
use crate::literal::Literal;

/// Render a statement into its canonical text form.
pub fn canonicalize(stmt: &Statement) -> String {
    match stmt {
        Statement::Select(select) => canonicalize_select(select),
    }
}

fn canonicalize_select(select: &SelectStatement) -> String {
    let mut out = String::from("SELECT ");
    if select.distinct {
        out.push_str("DISTINCT ");
    }
    out.push_str(&join(
        select.projection.iter().map(render_select_item),
        ", ",
    ));

    out.push_str(" FROM ");
    out.push_str(&render_table_ref(&select.from));
    for join in &select.joins {
        out.push_str(" JOIN ");
        out.push_str(&render_join(join));
    }

    if let Some(selection) = &select.selection {
        out.push_str(" WHERE ");
        out.push_str(&render_sorted_conjuncts(selection));
    }

    if !select.group_by.is_empty() {
        out.push_str(" GROUP BY ");
        out.push_str(&join(select.group_by.iter().map(render_expr), ", "));
    }

    if let Some(having) = &select.having {
        out.push_str(" HAVING ");
        out.push_str(&render_expr(having));
    }

    if !select.order_by.is_empty() {
        out.push_str(" ORDER BY ");
        out.push_str(&join(select.order_by.iter().map(render_order_by), ", "));
    }

    if let Some(limit) = select.limit {
        out.push_str(&format!(" LIMIT {limit}"));
    }

    out
}

/// Flatten the top-level `AND` chain, render each conjunct, sort lexicographically, rejoin.
/// This is what makes reordered `WHERE a AND b` / `WHERE b AND a` canonicalize identically.
fn render_sorted_conjuncts(expr: &Expr) -> String {
    let mut rendered: Vec<String> = flatten_conjuncts(expr).iter().map(render_expr).collect();
    rendered.sort();
    rendered.join(" AND ")
}

fn render_select_item(item: &SelectItem) -> String {
    let base = render_expr(&item.expr);
    match &item.alias {
        Some(alias) => format!("{base} AS {}", lower(alias)),
        None => base,
    }
}

fn render_table_ref(table: &TableRef) -> String {
    match &table.alias {
        Some(alias) => format!("{} {}", lower(&table.name), lower(alias)),
        None => lower(&table.name),
    }
}

fn render_join(join: &Join) -> String {
    let table = render_table_ref(&join.table);
    match &join.on {
        Some(on) => format!("{table} ON {}", render_expr(on)),
        None => table,
    }
}

fn render_order_by(item: &OrderByItem) -> String {
    format!(
        "{} {}",
        render_expr(&item.expr),
        if item.asc { "ASC" } else { "DESC" }
    )
}

/// Render a single expression. Columns are qualified (spec.md §4.1 rule (a); qualification
/// itself happens during analysis, see `sql::analyze`), identifiers lower-cased, keywords
/// upper-cased, literals canonically spelled.
pub(crate) fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Column { table, name } => match table {
            Some(t) => format!("{}.{}", lower(t), lower(name)),
            None => lower(name),
        },
        Expr::Literal(lit) => render_literal(lit),
        Expr::BinaryOp { left, op, right } => {
            format!("{} {} {}", render_expr(left), op.as_str(), render_expr(right))
        }
        Expr::Not(inner) => format!("NOT {}", render_expr(inner)),
        Expr::IsNull(inner) => format!("{} IS NULL", render_expr(inner)),
        Expr::IsNotNull(inner) => format!("{} IS NOT NULL", render_expr(inner)),
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let mut items: Vec<String> = list.iter().map(render_expr).collect();
            items.sort();
            format!(
                "{} {}IN ({})",
                render_expr(expr),
                if *negated { "NOT " } else { "" },
                items.join(", ")
            )
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => format!(
            "{} {}BETWEEN {} AND {}",
            render_expr(expr),
            if *negated { "NOT " } else { "" },
            render_expr(low),
            render_expr(high)
        ),
        Expr::Function {
            name,
            args,
            distinct,
            is_window,
        } => {
            let args_str = join(args.iter().map(render_expr), ", ");
            let distinct_str = if *distinct { "DISTINCT " } else { "" };
            let base = format!("{}({distinct_str}{args_str})", name.to_ascii_uppercase());
            if *is_window {
                format!("{base} OVER ()")
            } else {
                base
            }
        }
        Expr::Wildcard => "*".to_string(),
        Expr::Opaque(text) => normalize_whitespace(text),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Integer(v) => v.to_string(),
        Literal::Float(v) => v.to_string(),
        Literal::Boolean(v) => v.to_string().to_ascii_uppercase(),
        Literal::String(_) | Literal::Date(_) => lit.to_string(),
        Literal::TimestampNanos(v) => v.to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

fn lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join<I>(items: I, sep: &str) -> String
where
    I: Iterator<Item = String>,
{
    items.collect::<Vec<_>>().join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{optimize, parse, Dialect};

    fn canon(sql: &str) -> String {
        canonicalize(&optimize(parse(sql, Dialect::Generic).unwrap()))
    }

    #[test]
    fn equivalence_under_whitespace_case_and_conjunct_order() {
        let a = canon("select a from t where x=1 and y=2");
        let b = canon("SELECT   a FROM T WHERE Y = 2 AND X = 1");
        assert_eq!(a, b);
    }

    #[test]
    fn equivalence_under_parenthesization() {
        let a = canon("SELECT a FROM t WHERE x = 1 AND y = 2 AND z = 3");
        let b = canon("SELECT a FROM t WHERE (x = 1 AND y = 2) AND z = 3");
        assert_eq!(a, b);
    }

    #[test]
    fn s3_reordered_conjuncts_canonicalize_identically() {
        let a = canon(
            "SELECT region, SUM(amount) FROM sales WHERE date >= '2024-11-01' AND date <= '2024-11-07' GROUP BY region",
        );
        let b = canon(
            "SELECT region, SUM(amount) FROM sales WHERE date <= '2024-11-07' AND date >= '2024-11-01' GROUP BY region",
        );
        assert_eq!(a, b);
    }
}
