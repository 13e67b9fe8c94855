//! [`Catalog`] — the mapping from logical table name to root directory and schema.
//!
//! Grounded in the teacher's `iox_catalog` crate: a small, lock-guarded registry that tables are
//! created in once and looked up from many times, mutation taking an exclusive lock (spec.md §5).

use crate::schema::Schema;
use parking_lot::RwLock;
use snafu::prelude::*;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A registered table: an immutable root directory plus an optional declared schema.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    root: PathBuf,
    schema: Option<Schema>,
}

impl Table {
    /// The table's logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root directory this table's partitions are rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The table's declared schema, if registered with one.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }
}

/// Errors raised by [`Catalog`] registration and lookup.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Raised by [`Catalog::table`] when the name was never registered.
    #[snafu(display("unknown table '{name}'"))]
    UnknownTable {
        /// The table name that was looked up.
        name: String,
    },

    /// Raised by [`Catalog::register`] when a table of that name already exists.
    #[snafu(display("table '{name}' is already registered"))]
    AlreadyRegistered {
        /// The table name that was re-registered.
        name: String,
    },
}

/// Result alias for catalog operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The table registry. Tables are created once and referenced many times (spec.md §3 Lifecycle).
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new table. Fails if the name is already taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        schema: Option<Schema>,
    ) -> Result<Arc<Table>> {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return AlreadyRegisteredSnafu { name }.fail();
        }
        let table = Arc::new(Table {
            name: name.clone(),
            root: root.into(),
            schema,
        });
        tables.insert(name, Arc::clone(&table));
        Ok(table)
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .context(UnknownTableSnafu { name })
    }

    /// All registered table names.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn register_then_lookup() {
        let catalog = Catalog::new();
        catalog.register("sales", "/d", None).unwrap();
        let table = catalog.table("sales").unwrap();
        assert_eq!(table.name(), "sales");
        assert_eq!(table.root(), Path::new("/d"));
    }

    #[test]
    fn unknown_table_errors() {
        let catalog = Catalog::new();
        let err = catalog.table("missing").unwrap_err();
        assert_matches!(err, Error::UnknownTable { .. });
    }

    #[test]
    fn duplicate_registration_errors() {
        let catalog = Catalog::new();
        catalog.register("sales", "/d", None).unwrap();
        let err = catalog.register("sales", "/d", None).unwrap_err();
        assert_matches!(err, Error::AlreadyRegistered { .. });
    }
}
