//! msidb Catalog - Schema catalog management
//!
//! The catalog is the reserved pair of tables that describes every other
//! table: `_Tables` lists table names and `_Columns` lists, per table, each
//! column's ordinal, name and packed type tag. In memory it is indexed so
//! that "does table T have column C" is a hash lookup.

use hashbrown::HashMap;
use msidb_common::{ColumnDescriptor, Error, Ordinal, Result};
use parking_lot::RwLock;
use tracing::debug;

mod persistence;
mod table;

pub use table::TableSchema;

/// Reserved table listing all persisted tables
pub const TABLES_TABLE: &str = "_Tables";
/// Reserved table listing all persisted columns
pub const COLUMNS_TABLE: &str = "_Columns";

/// Names user tables may not take
pub const RESERVED_NAMES: [&str; 4] = [
    TABLES_TABLE,
    COLUMNS_TABLE,
    msidb_storage::STRING_POOL_STREAM,
    msidb_storage::STRING_DATA_STREAM,
];

/// The schema catalog for one database
pub struct SchemaCatalog {
    tables: RwLock<HashMap<String, TableSchema>>,
}

impl SchemaCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        SchemaCatalog {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new table with its initial columns
    ///
    /// Ordinals are assigned 1..n in the given order. Columns of a temporary
    /// table are temporary too.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        temporary: bool,
    ) -> Result<Vec<ColumnDescriptor>> {
        if RESERVED_NAMES.contains(&name) {
            return Err(Error::BadSchema(format!("table name {} is reserved", name)));
        }
        if name.is_empty() || name.contains('.') {
            return Err(Error::BadSchema(format!("invalid table name {:?}", name)));
        }
        if columns.is_empty() {
            return Err(Error::BadSchema(format!("table {} has no columns", name)));
        }

        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        let mut schema = TableSchema::new(name, temporary);
        for (i, mut column) in columns.into_iter().enumerate() {
            if schema.has_column(&column.name) {
                return Err(Error::BadSchema(format!(
                    "duplicate column {} in table {}",
                    column.name, name
                )));
            }
            column.table = name.to_string();
            column.ordinal = i as Ordinal + 1;
            column.temporary |= temporary;
            schema.push(column);
        }

        let created = schema.columns().to_vec();
        tables.insert(name.to_string(), schema);
        debug!(table = name, columns = created.len(), temporary, "registered table");
        Ok(created)
    }

    /// Check whether a table is registered
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Get a copy of a table's schema
    pub fn table(&self, name: &str) -> Option<TableSchema> {
        self.tables.read().get(name).cloned()
    }

    /// List all table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Point lookup of (table, column)
    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.tables
            .read()
            .get(table)
            .map(|t| t.has_column(column))
            .unwrap_or(false)
    }

    /// Get a single column descriptor
    pub fn column(&self, table: &str, column: &str) -> Option<ColumnDescriptor> {
        self.tables.read().get(table)?.get_column(column).cloned()
    }

    /// A table's columns in ordinal order
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.columns().to_vec())
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    /// Number of catalog rows for a table
    pub fn column_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|t| t.column_count())
            .unwrap_or(0)
    }

    /// Append one column row; the only write path used by ADD COLUMN
    ///
    /// The column must not exist yet and its ordinal must extend the
    /// table's ordinals without a gap.
    pub fn append_column(&self, column: ColumnDescriptor) -> Result<()> {
        let mut tables = self.tables.write();
        let schema = tables
            .get_mut(&column.table)
            .ok_or_else(|| Error::TableNotFound(column.table.clone()))?;

        if schema.has_column(&column.name) {
            return Err(Error::BadSchema(format!(
                "column {} already exists in table {}",
                column.name, column.table
            )));
        }
        let expected = schema.column_count() as Ordinal + 1;
        if column.ordinal != expected {
            return Err(Error::BadSchema(format!(
                "column {}.{} has ordinal {}, expected {}",
                column.table, column.name, column.ordinal, expected
            )));
        }

        debug!(table = %column.table, column = %column.name, ordinal = column.ordinal, "appended catalog column");
        schema.push(column);
        Ok(())
    }

    /// Forget the session-only parts of a table
    ///
    /// Temporary columns are dropped and the survivors renumbered; a
    /// temporary table is removed entirely. Returns the removed columns.
    pub fn purge_temporary(&self, table: &str) -> Vec<ColumnDescriptor> {
        let mut tables = self.tables.write();
        let Some(schema) = tables.get_mut(table) else {
            return Vec::new();
        };

        if schema.temporary {
            let removed = schema.columns().to_vec();
            tables.remove(table);
            debug!(table, "removed temporary table from catalog");
            return removed;
        }

        let removed = schema.retain_persistent();
        if !removed.is_empty() {
            debug!(table, removed = removed.len(), "purged temporary columns");
        }
        removed
    }

    /// Drop a table's entry, returning whether it existed
    pub fn remove_table(&self, name: &str) -> bool {
        let removed = self.tables.write().remove(name).is_some();
        if removed {
            debug!(table = name, "removed table from catalog");
        }
        removed
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}
