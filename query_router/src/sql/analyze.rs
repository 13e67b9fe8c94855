//! Glue: parse, resolve against the catalog, optimize, canonicalize, extract (spec.md §4.1, §4.5
//! step 1 "Analyze").

use super::ast::{BinOp, Expr, SelectStatement, Statement, TableRef};
use super::canonicalize::{canonicalize, render_expr};
use super::features::{self, Features};
use super::optimize::{flatten_conjuncts, optimize};
use super::parse::parse;
use super::{AmbiguousColumnSnafu, Dialect, Result, UnknownTableSnafu};
use crate::catalog::Catalog;
use crate::literal::Literal;
use crate::predicate::Predicate;
use snafu::prelude::*;
use std::collections::HashMap;

/// The fully analyzed form of a query: a qualified, optimized AST plus everything downstream
/// pipeline stages (pruning, cost selection, caching) need, computed once.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    /// The optimized, column-qualified statement.
    pub statement: Statement,
    /// Deterministic canonical rendering, used as the cache key's text component.
    pub canonical_text: String,
    /// Shape features feeding the cost model.
    pub features: Features,
    /// Tables referenced by the query, in `FROM`/`JOIN` order.
    pub tables: Vec<String>,
    /// Predicate conjuncts attributable to a single table, keyed by table name. Conjuncts that
    /// span more than one table (join conditions) or that don't name a table are omitted here;
    /// the full `WHERE` is still carried in `statement`/`canonical_text` for the executor.
    pub predicates_by_table: HashMap<String, Vec<Predicate>>,
}

/// Analyze `sql`: parse, resolve table/column references against `catalog`, optimize,
/// canonicalize, and extract features and per-table predicates.
pub fn analyze(sql: &str, dialect: Dialect, catalog: &Catalog) -> Result<AnalyzedQuery> {
    let parsed = parse(sql, dialect)?;
    let Statement::Select(select) = parsed else {
        unreachable!("Statement has only the Select variant")
    };
    let (qualified, qualifier_to_table) = resolve(select, catalog)?;
    let optimized = optimize(Statement::Select(qualified));
    let canonical_text = canonicalize(&optimized);
    let features = features::extract(&optimized);

    let Statement::Select(select) = &optimized else {
        unreachable!("Statement has only the Select variant")
    };
    let tables = referenced_tables(select);
    let predicates_by_table = select
        .selection
        .as_ref()
        .map(|selection| extract_predicates(selection, &qualifier_to_table))
        .unwrap_or_default();

    Ok(AnalyzedQuery {
        statement: optimized,
        canonical_text,
        features,
        tables,
        predicates_by_table,
    })
}

fn referenced_tables(select: &SelectStatement) -> Vec<String> {
    let mut tables = vec![select.from.name.clone()];
    tables.extend(select.joins.iter().map(|j| j.table.name.clone()));
    tables
}

/// Validate every referenced table exists, then qualify unqualified columns by the single
/// referenced table whose declared schema contains them (spec.md §4.1/§4.5: `UnknownTable`,
/// `AmbiguousColumn`).
///
/// Returns the qualified statement plus the qualifier-to-table-name map (`"s" -> "sales"` for
/// `FROM sales s`), since downstream predicate attribution qualifies columns by alias but needs
/// to key per-table state (pruning, cache witnesses) by the catalog table name.
fn resolve(
    mut select: SelectStatement,
    catalog: &Catalog,
) -> Result<(SelectStatement, HashMap<String, String>)> {
    let mut refs: Vec<TableRef> = vec![select.from.clone()];
    refs.extend(select.joins.iter().map(|j| j.table.clone()));

    let mut tables = Vec::with_capacity(refs.len());
    let mut qualifier_to_table = HashMap::with_capacity(refs.len());
    for table_ref in &refs {
        let table = catalog
            .table(&table_ref.name)
            .ok()
            .context(UnknownTableSnafu {
                name: table_ref.name.clone(),
            })?;
        let qualifier = table_ref.qualifier().to_string();
        qualifier_to_table.insert(qualifier.clone(), table_ref.name.clone());
        tables.push((qualifier, table));
    }

    select.projection = select
        .projection
        .into_iter()
        .map(|mut item| {
            item.expr = qualify_expr(item.expr, &tables)?;
            Ok(item)
        })
        .collect::<Result<Vec<_>>>()?;
    select.selection = select
        .selection
        .map(|e| qualify_expr(e, &tables))
        .transpose()?;
    select.group_by = select
        .group_by
        .into_iter()
        .map(|e| qualify_expr(e, &tables))
        .collect::<Result<Vec<_>>>()?;
    select.having = select
        .having
        .map(|e| qualify_expr(e, &tables))
        .transpose()?;
    select.order_by = select
        .order_by
        .into_iter()
        .map(|mut o| {
            o.expr = qualify_expr(o.expr, &tables)?;
            Ok(o)
        })
        .collect::<Result<Vec<_>>>()?;
    for join in &mut select.joins {
        join.on = join
            .on
            .take()
            .map(|e| qualify_expr(e, &tables))
            .transpose()?;
    }

    Ok((select, qualifier_to_table))
}

fn qualify_expr(expr: Expr, tables: &[(String, std::sync::Arc<crate::catalog::Table>)]) -> Result<Expr> {
    Ok(match expr {
        Expr::Column { table: None, name } => {
            let owner = owning_table(&name, tables)?;
            Expr::Column {
                table: owner,
                name,
            }
        }
        Expr::Column { table: Some(t), name } => Expr::Column {
            table: Some(t),
            name,
        },
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(qualify_expr(*left, tables)?),
            op,
            right: Box::new(qualify_expr(*right, tables)?),
        },
        Expr::Not(inner) => Expr::Not(Box::new(qualify_expr(*inner, tables)?)),
        Expr::IsNull(inner) => Expr::IsNull(Box::new(qualify_expr(*inner, tables)?)),
        Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(qualify_expr(*inner, tables)?)),
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(qualify_expr(*expr, tables)?),
            list: list
                .into_iter()
                .map(|e| qualify_expr(e, tables))
                .collect::<Result<Vec<_>>>()?,
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(qualify_expr(*expr, tables)?),
            low: Box::new(qualify_expr(*low, tables)?),
            high: Box::new(qualify_expr(*high, tables)?),
            negated,
        },
        Expr::Function {
            name,
            args,
            distinct,
            is_window,
        } => Expr::Function {
            name,
            args: args
                .into_iter()
                .map(|e| qualify_expr(e, tables))
                .collect::<Result<Vec<_>>>()?,
            distinct,
            is_window,
        },
        other => other,
    })
}

/// Determine which single referenced table owns an unqualified column name, by declared schema.
/// With one referenced table, or no declared schemas at all, resolution is unambiguous by
/// construction and falls back to the primary table. With several tables that *do* declare
/// schemas, a name present in more than one is rejected as ambiguous.
fn owning_table(
    name: &str,
    tables: &[(String, std::sync::Arc<crate::catalog::Table>)],
) -> Result<Option<String>> {
    if tables.len() == 1 {
        return Ok(Some(tables[0].0.clone()));
    }

    let matches: Vec<&str> = tables
        .iter()
        .filter(|(_, table)| {
            table
                .schema()
                .map(|schema| schema.column(name).is_some())
                .unwrap_or(false)
        })
        .map(|(qualifier, _)| qualifier.as_str())
        .collect();

    match matches.len() {
        0 => Ok(Some(tables[0].0.clone())),
        1 => Ok(Some(matches[0].to_string())),
        _ => AmbiguousColumnSnafu {
            name: name.to_string(),
        }
        .fail(),
    }
}

/// Split the (already flattened, AND-joined) `WHERE` clause into per-table predicate lists.
/// A conjunct that references exactly one table becomes a typed `Predicate` when its shape
/// matches one of spec.md §3's forms, or `Predicate::Other` otherwise; a conjunct spanning more
/// than one table (a join condition that leaked into `WHERE`) is dropped from pruning entirely.
///
/// Conjuncts are keyed by column qualifier (the table alias), then remapped through
/// `qualifier_to_table` to the catalog table name, since that's what partition indexes and scan
/// plans are keyed by (`build_scan_plan` looks up predicates by table name, not alias).
fn extract_predicates(
    selection: &Expr,
    qualifier_to_table: &HashMap<String, String>,
) -> HashMap<String, Vec<Predicate>> {
    let mut out: HashMap<String, Vec<Predicate>> = HashMap::new();
    for conjunct in flatten_conjuncts(selection) {
        let Some(qualifier) = single_table_of(&conjunct) else {
            continue;
        };
        let table = qualifier_to_table
            .get(&qualifier)
            .cloned()
            .unwrap_or(qualifier);
        let predicate = to_predicate(&conjunct);
        out.entry(table).or_default().push(predicate);
    }
    out
}

/// The single table qualifying every column in `expr`, or `None` if zero or more than one do.
fn single_table_of(expr: &Expr) -> Option<String> {
    let mut found: Option<String> = None;
    let mut ambiguous = false;
    collect_tables(expr, &mut found, &mut ambiguous);
    if ambiguous {
        None
    } else {
        found
    }
}

fn collect_tables(expr: &Expr, found: &mut Option<String>, ambiguous: &mut bool) {
    match expr {
        Expr::Column {
            table: Some(t), ..
        } => match found {
            Some(existing) if existing != t => *ambiguous = true,
            _ => *found = Some(t.clone()),
        },
        Expr::BinaryOp { left, right, .. } => {
            collect_tables(left, found, ambiguous);
            collect_tables(right, found, ambiguous);
        }
        Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            collect_tables(inner, found, ambiguous)
        }
        Expr::InList { expr, list, .. } => {
            collect_tables(expr, found, ambiguous);
            for item in list {
                collect_tables(item, found, ambiguous);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_tables(expr, found, ambiguous);
            collect_tables(low, found, ambiguous);
            collect_tables(high, found, ambiguous);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                collect_tables(arg, found, ambiguous);
            }
        }
        _ => {}
    }
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column { name, .. } => Some(name),
        _ => None,
    }
}

fn literal_of(expr: &Expr) -> Option<&Literal> {
    match expr {
        Expr::Literal(lit) => Some(lit),
        _ => None,
    }
}

fn to_predicate(expr: &Expr) -> Predicate {
    match expr {
        Expr::BinaryOp { left, op, right } => {
            let (col, lit, op) = match (column_name(left), literal_of(right)) {
                (Some(c), Some(l)) => (c, l, *op),
                _ => match (literal_of(left), column_name(right)) {
                    (Some(l), Some(c)) => (c, l, flip(*op)),
                    _ => return Predicate::Other(render_expr(expr)),
                },
            };
            match op {
                BinOp::Eq => Predicate::Eq(col.to_string(), lit.clone()),
                BinOp::NotEq => Predicate::Neq(col.to_string(), lit.clone()),
                BinOp::Lt => Predicate::Range {
                    column: col.to_string(),
                    lo: None,
                    hi: Some(lit.clone()),
                    lo_inclusive: false,
                    hi_inclusive: false,
                },
                BinOp::LtEq => Predicate::Range {
                    column: col.to_string(),
                    lo: None,
                    hi: Some(lit.clone()),
                    lo_inclusive: false,
                    hi_inclusive: true,
                },
                BinOp::Gt => Predicate::Range {
                    column: col.to_string(),
                    lo: Some(lit.clone()),
                    hi: None,
                    lo_inclusive: false,
                    hi_inclusive: false,
                },
                BinOp::GtEq => Predicate::Range {
                    column: col.to_string(),
                    lo: Some(lit.clone()),
                    hi: None,
                    lo_inclusive: true,
                    hi_inclusive: false,
                },
                BinOp::And | BinOp::Or => Predicate::Other(render_expr(expr)),
            }
        }
        Expr::Between {
            expr,
            low,
            high,
            negated: false,
        } => match (column_name(expr), literal_of(low), literal_of(high)) {
            (Some(c), Some(lo), Some(hi)) => Predicate::Range {
                column: c.to_string(),
                lo: Some(lo.clone()),
                hi: Some(hi.clone()),
                lo_inclusive: true,
                hi_inclusive: true,
            },
            _ => Predicate::Other(render_expr(expr)),
        },
        Expr::InList {
            expr,
            list,
            negated: false,
        } => match column_name(expr) {
            Some(c) if list.iter().all(|e| literal_of(e).is_some()) => Predicate::In(
                c.to_string(),
                list.iter().map(|e| literal_of(e).unwrap().clone()).collect(),
            ),
            _ => Predicate::Other(render_expr(&Expr::InList {
                expr: expr.clone(),
                list: list.clone(),
                negated: false,
            })),
        },
        Expr::IsNull(inner) => match column_name(inner) {
            Some(c) => Predicate::IsNull(c.to_string()),
            None => Predicate::Other(render_expr(expr)),
        },
        Expr::IsNotNull(inner) => match column_name(inner) {
            Some(c) => Predicate::IsNotNull(c.to_string()),
            None => Predicate::Other(render_expr(expr)),
        },
        other => Predicate::Other(render_expr(other)),
    }
}

fn flip(op: BinOp) -> BinOp {
    match op {
        BinOp::Lt => BinOp::Gt,
        BinOp::LtEq => BinOp::GtEq,
        BinOp::Gt => BinOp::Lt,
        BinOp::GtEq => BinOp::LtEq,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::schema::{Column as SchemaColumn, LogicalType, Schema};

    fn catalog_with_sales() -> Catalog {
        let catalog = Catalog::new();
        catalog.register("sales", "/data/sales", None).unwrap();
        catalog
    }

    #[test]
    fn unknown_table_is_rejected() {
        let catalog = Catalog::new();
        let err = analyze("SELECT a FROM sales", Dialect::Generic, &catalog).unwrap_err();
        assert_matches!(err, super::super::Error::UnknownTable { .. });
    }

    #[test]
    fn single_table_columns_are_qualified() {
        let catalog = catalog_with_sales();
        let analyzed = analyze(
            "SELECT region FROM sales WHERE region = 'us'",
            Dialect::Generic,
            &catalog,
        )
        .unwrap();
        assert_eq!(analyzed.tables, vec!["sales".to_string()]);
        assert_eq!(analyzed.predicates_by_table["sales"].len(), 1);
        assert_matches!(
            &analyzed.predicates_by_table["sales"][0],
            Predicate::Eq(col, _) if col == "region"
        );
    }

    #[test]
    fn ambiguous_unqualified_column_across_schemas_is_rejected() {
        let catalog = Catalog::new();
        let schema = Schema::new(vec![SchemaColumn::new("id", LogicalType::Int64)]);
        catalog
            .register("t", "/data/t", Some(schema.clone()))
            .unwrap();
        catalog.register("u", "/data/u", Some(schema)).unwrap();
        let err = analyze(
            "SELECT id FROM t JOIN u ON t.id = u.id",
            Dialect::Generic,
            &catalog,
        )
        .unwrap_err();
        assert_matches!(err, super::super::Error::AmbiguousColumn { .. });
    }

    #[test]
    fn aliased_table_predicates_are_keyed_by_table_name_not_alias() {
        let catalog = catalog_with_sales();
        let analyzed = analyze(
            "SELECT region, SUM(amount) FROM sales s WHERE s.date >= '2024-11-01' AND s.date <= '2024-11-07' GROUP BY region",
            Dialect::Generic,
            &catalog,
        )
        .unwrap();
        assert_eq!(analyzed.tables, vec!["sales".to_string()]);
        assert!(analyzed.predicates_by_table.contains_key("sales"));
        assert!(!analyzed.predicates_by_table.contains_key("s"));
        assert_eq!(analyzed.predicates_by_table["sales"].len(), 2);
    }

    #[test]
    fn join_condition_is_not_attributed_to_pruning() {
        let catalog = Catalog::new();
        catalog.register("t", "/data/t", None).unwrap();
        catalog.register("u", "/data/u", None).unwrap();
        let analyzed = analyze(
            "SELECT t.id FROM t JOIN u ON t.id = u.id WHERE t.region = 'us'",
            Dialect::Generic,
            &catalog,
        )
        .unwrap();
        assert_eq!(analyzed.predicates_by_table["t"].len(), 1);
        assert!(!analyzed.predicates_by_table.contains_key("u"));
    }
}
