//! A closed AST for the single-`SELECT` subset of SQL this crate accepts (spec.md §6, design
//! note: "dynamic AST typing in the source is replaced by a closed tagged variant").

use crate::literal::Literal;

/// A scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A (possibly table-qualified) column reference.
    Column {
        /// Table alias/name, if known at this point in the pipeline.
        table: Option<String>,
        /// Column name.
        name: String,
    },
    /// A literal value.
    Literal(Literal),
    /// A binary operation.
    BinaryOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
    /// `expr IS NULL`.
    IsNull(Box<Expr>),
    /// `expr IS NOT NULL`.
    IsNotNull(Box<Expr>),
    /// `expr [NOT] IN (list)`.
    InList {
        /// The probed expression.
        expr: Box<Expr>,
        /// Candidate values.
        list: Vec<Expr>,
        /// Whether this is `NOT IN`.
        negated: bool,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// The probed expression.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// Whether this is `NOT BETWEEN`.
        negated: bool,
    },
    /// A function call, e.g. `SUM(amount)`, `ROW_NUMBER() OVER (...)`.
    Function {
        /// Function name, upper-cased.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
        /// Whether `DISTINCT` appeared inside the call.
        distinct: bool,
        /// Whether this call carries an `OVER (...)` clause (a window function).
        is_window: bool,
    },
    /// `*` or `table.*`.
    Wildcard,
    /// Anything this AST can't decompose further (e.g. a `CASE` expression): preserved verbatim
    /// as its canonical textual rendering for the executor, opaque to the pruner.
    Opaque(String),
}

/// A binary comparison/logical operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `=`
    Eq,
    /// `!=` / `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinOp {
    /// Canonical textual spelling (spec.md §4.1 keyword upper-casing).
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}

/// A single projected item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    /// The projected expression.
    pub expr: Expr,
    /// An optional `AS alias`.
    pub alias: Option<String>,
}

/// A referenced table, with its optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Table name as it appears in the catalog.
    pub name: String,
    /// Alias, if any; otherwise `name` is used as the qualifying alias.
    pub alias: Option<String>,
}

impl TableRef {
    /// The alias columns are qualified with: the explicit alias, or the table name.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An `ORDER BY` item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    /// The sort key.
    pub expr: Expr,
    /// Ascending (`true`) or descending.
    pub asc: bool,
}

/// A join between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// The joined table.
    pub table: TableRef,
    /// The `ON` predicate, if any (a `CROSS JOIN` has none).
    pub on: Option<Expr>,
}

/// The single statement shape this crate accepts: `SELECT ... FROM ... [WHERE ...] [GROUP BY
/// ...] [HAVING ...] [ORDER BY ...] [LIMIT ...]` (spec.md §4.1, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Whether `SELECT DISTINCT` was used.
    pub distinct: bool,
    /// The projection list.
    pub projection: Vec<SelectItem>,
    /// The primary (first, comma-joined) table.
    pub from: TableRef,
    /// Additional tables joined via explicit `JOIN`.
    pub joins: Vec<Join>,
    /// The `WHERE` clause, if any.
    pub selection: Option<Expr>,
    /// `GROUP BY` expressions.
    pub group_by: Vec<Expr>,
    /// The `HAVING` clause, if any.
    pub having: Option<Expr>,
    /// `ORDER BY` items.
    pub order_by: Vec<OrderByItem>,
    /// A constant `LIMIT`, if present.
    pub limit: Option<i64>,
}

/// The set of statements this crate can analyze. Only `SELECT` is supported (spec.md §4.1);
/// anything else fails to parse with `UnsupportedStatement`.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A `SELECT` query.
    Select(SelectStatement),
}
