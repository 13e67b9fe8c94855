//! Wraps `sqlparser` and reshapes its AST into the crate's closed [`ast::Statement`].

use super::ast::{BinOp, Expr, Join, OrderByItem, SelectItem, SelectStatement, Statement, TableRef};
use super::{Dialect, Error, ParseSnafu, Result, UnsupportedStatementSnafu};
use crate::literal::{parse_date, Literal};
use snafu::prelude::*;
use sqlparser::ast as sp;
use sqlparser::dialect::{GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

/// Parse `sql` under `dialect` into a single-`SELECT` [`Statement`] (spec.md §4.1).
pub fn parse(sql: &str, dialect: Dialect) -> Result<Statement> {
    let statements = match dialect {
        Dialect::Generic => Parser::parse_sql(&GenericDialect {}, sql),
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
    }
    .map_err(|e| {
        ParseSnafu {
            position: 0,
            message: e.to_string(),
        }
        .build()
    })?;

    if statements.len() != 1 {
        return UnsupportedStatementSnafu {
            message: format!("expected exactly one statement, got {}", statements.len()),
        }
        .fail();
    }

    match statements.into_iter().next().expect("checked len == 1") {
        sp::Statement::Query(query) => convert_query(*query),
        other => UnsupportedStatementSnafu {
            message: format!("only SELECT queries are supported, got {other:?}"),
        }
        .fail(),
    }
}

fn convert_query(query: sp::Query) -> Result<Statement> {
    let select = match query.body {
        sp::SetExpr::Select(select) => *select,
        other => {
            return UnsupportedStatementSnafu {
                message: format!("only a single SELECT is supported, got {other:?}"),
            }
            .fail()
        }
    };

    if select.from.len() != 1 {
        return UnsupportedStatementSnafu {
            message: "exactly one FROM item is supported (use JOIN for multiple tables)"
                .to_string(),
        }
        .fail();
    }
    let twj = select.from.into_iter().next().expect("checked len == 1");
    let from = convert_table_factor(twj.relation)?;
    let joins = twj
        .joins
        .into_iter()
        .map(convert_join)
        .collect::<Result<Vec<_>>>()?;

    let projection = select
        .projection
        .into_iter()
        .map(convert_select_item)
        .collect::<Result<Vec<_>>>()?;

    let selection = select.selection.map(convert_expr).transpose()?;
    let group_by = select
        .group_by
        .into_iter()
        .map(convert_expr)
        .collect::<Result<Vec<_>>>()?;
    let having = select.having.map(convert_expr).transpose()?;

    let order_by = query
        .order_by
        .into_iter()
        .map(|o| {
            Ok(OrderByItem {
                expr: convert_expr(o.expr)?,
                asc: o.asc.unwrap_or(true),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let limit = query
        .limit
        .and_then(|e| match e {
            sp::Expr::Value(sp::Value::Number(n, _)) => n.parse::<i64>().ok(),
            _ => None,
        });

    Ok(Statement::Select(SelectStatement {
        distinct: select.distinct,
        projection,
        from,
        joins,
        selection,
        group_by,
        having,
        order_by,
        limit,
    }))
}

fn convert_table_factor(factor: sp::TableFactor) -> Result<TableRef> {
    match factor {
        sp::TableFactor::Table { name, alias, .. } => Ok(TableRef {
            name: name.to_string(),
            alias: alias.map(|a| a.name.value),
        }),
        other => UnsupportedStatementSnafu {
            message: format!("unsupported FROM item: {other}"),
        }
        .fail(),
    }
}

fn convert_join(join: sp::Join) -> Result<Join> {
    let table = convert_table_factor(join.relation)?;
    let on = match join.join_operator {
        sp::JoinOperator::Inner(sp::JoinConstraint::On(e))
        | sp::JoinOperator::LeftOuter(sp::JoinConstraint::On(e))
        | sp::JoinOperator::RightOuter(sp::JoinConstraint::On(e))
        | sp::JoinOperator::FullOuter(sp::JoinConstraint::On(e)) => Some(convert_expr(e)?),
        _ => None,
    };
    Ok(Join { table, on })
}

fn convert_select_item(item: sp::SelectItem) -> Result<SelectItem> {
    match item {
        sp::SelectItem::UnnamedExpr(e) => Ok(SelectItem {
            expr: convert_expr(e)?,
            alias: None,
        }),
        sp::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem {
            expr: convert_expr(expr)?,
            alias: Some(alias.value),
        }),
        sp::SelectItem::Wildcard => Ok(SelectItem {
            expr: Expr::Wildcard,
            alias: None,
        }),
        sp::SelectItem::QualifiedWildcard(_) => Ok(SelectItem {
            expr: Expr::Wildcard,
            alias: None,
        }),
    }
}

fn convert_expr(expr: sp::Expr) -> Result<Expr> {
    Ok(match expr {
        sp::Expr::Identifier(ident) => Expr::Column {
            table: None,
            name: ident.value,
        },
        sp::Expr::CompoundIdentifier(parts) if parts.len() == 2 => Expr::Column {
            table: Some(parts[0].value.clone()),
            name: parts[1].value.clone(),
        },
        sp::Expr::Nested(inner) => convert_expr(*inner)?,
        sp::Expr::Value(v) => Expr::Literal(convert_value(v)),
        sp::Expr::UnaryOp {
            op: sp::UnaryOperator::Not,
            expr,
        } => Expr::Not(Box::new(convert_expr(*expr)?)),
        sp::Expr::IsNull(inner) => Expr::IsNull(Box::new(convert_expr(*inner)?)),
        sp::Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(convert_expr(*inner)?)),
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(convert_expr(*expr)?),
            list: list
                .into_iter()
                .map(convert_expr)
                .collect::<Result<Vec<_>>>()?,
            negated,
        },
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Expr::Between {
            expr: Box::new(convert_expr(*expr)?),
            low: Box::new(convert_expr(*low)?),
            high: Box::new(convert_expr(*high)?),
            negated,
        },
        sp::Expr::BinaryOp { left, op, right } => match convert_bin_op(&op) {
            Some(op) => Expr::BinaryOp {
                left: Box::new(convert_expr(*left)?),
                op,
                right: Box::new(convert_expr(*right)?),
            },
            None => Expr::Opaque(format!(
                "{} {} {}",
                left,
                op,
                right
            )),
        },
        sp::Expr::Function(func) => convert_function(func)?,
        sp::Expr::Wildcard => Expr::Wildcard,
        sp::Expr::QualifiedWildcard(_) => Expr::Wildcard,
        other => Expr::Opaque(other.to_string()),
    })
}

fn convert_bin_op(op: &sp::BinaryOperator) -> Option<BinOp> {
    use sp::BinaryOperator::*;
    Some(match op {
        Eq => BinOp::Eq,
        NotEq => BinOp::NotEq,
        Lt => BinOp::Lt,
        LtEq => BinOp::LtEq,
        Gt => BinOp::Gt,
        GtEq => BinOp::GtEq,
        And => BinOp::And,
        Or => BinOp::Or,
        _ => return None,
    })
}

fn convert_function(func: sp::Function) -> Result<Expr> {
    let name = func.name.to_string().to_ascii_uppercase();
    let is_window = func.over.is_some();
    let mut args = Vec::with_capacity(func.args.len());
    for arg in func.args {
        let expr = match arg {
            sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => convert_expr(e)?,
            sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => Expr::Wildcard,
            sp::FunctionArg::Named { arg, .. } => match arg {
                sp::FunctionArgExpr::Expr(e) => convert_expr(e)?,
                sp::FunctionArgExpr::Wildcard => Expr::Wildcard,
                _ => Expr::Wildcard,
            },
            _ => Expr::Wildcard,
        };
        args.push(expr);
    }
    Ok(Expr::Function {
        name,
        args,
        distinct: func.distinct,
        is_window,
    })
}

fn convert_value(value: sp::Value) -> Literal {
    match value {
        sp::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Literal::Integer(i)
            } else if let Ok(f) = n.parse::<f64>() {
                Literal::Float(f)
            } else {
                Literal::String(n)
            }
        }
        sp::Value::SingleQuotedString(s) => {
            if let Some(days) = parse_date(&s) {
                Literal::Date(days)
            } else {
                Literal::String(s)
            }
        }
        sp::Value::Boolean(b) => Literal::Boolean(b),
        sp::Value::Null => Literal::Null,
        other => Literal::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_simple_select() {
        let stmt = parse(
            "SELECT region, SUM(amount) FROM sales WHERE date >= '2024-11-01' GROUP BY region",
            Dialect::Generic,
        )
        .unwrap();
        let Statement::Select(select) = stmt else {
            panic!("expected a SELECT statement");
        };
        assert_eq!(select.from.name.to_lowercase(), "sales");
        assert_eq!(select.projection.len(), 2);
        assert!(select.selection.is_some());
        assert_eq!(select.group_by.len(), 1);
    }

    #[test]
    fn rejects_non_select_statements() {
        let err = parse("DELETE FROM sales", Dialect::Generic).unwrap_err();
        assert_matches!(err, Error::UnsupportedStatement { .. });
    }

    #[test]
    fn surfaces_parse_errors() {
        let err = parse("SELECT FROM FROM", Dialect::Generic).unwrap_err();
        assert_matches!(err, Error::Parse { .. });
    }
}
