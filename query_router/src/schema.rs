//! Declared table schemas and result-row logical types (spec.md §6).

use std::fmt;

/// The logical types a column (or result row) may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Days since the Unix epoch.
    Date,
    /// Nanoseconds since the Unix epoch.
    TimestampNanos,
    /// SQL `NULL` (used only in result schemas for all-null columns).
    Null,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Int64 => "int64",
            LogicalType::Float64 => "float64",
            LogicalType::Bool => "bool",
            LogicalType::String => "string",
            LogicalType::Date => "date",
            LogicalType::TimestampNanos => "timestamp_ns",
            LogicalType::Null => "null",
        };
        write!(f, "{name}")
    }
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, lower-cased (spec.md §4.1 canonicalization rule).
    pub name: String,
    /// Declared logical type.
    pub logical_type: LogicalType,
}

impl Column {
    /// Construct a column declaration.
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            logical_type,
        }
    }
}

/// An ordered list of column declarations, optionally attached to a [`crate::catalog::Table`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build a schema from an ordered column list.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Look up a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&Column> {
        let name = name.to_ascii_lowercase();
        self.columns.iter().find(|c| c.name == name)
    }

    /// All declared columns, in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}
