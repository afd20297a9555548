//! Shared state handed to every view

use msidb_catalog::SchemaCatalog;
use msidb_common::{ColumnDescriptor, Error, Result};
use msidb_storage::{TableData, TableStore};
use std::sync::Arc;
use tracing::debug;

/// The table store and schema catalog of one database
#[derive(Clone)]
pub struct ExecutionContext {
    store: Arc<TableStore>,
    catalog: Arc<SchemaCatalog>,
}

impl ExecutionContext {
    pub fn new(store: Arc<TableStore>, catalog: Arc<SchemaCatalog>) -> Self {
        ExecutionContext { store, catalog }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Register a table in the catalog and create its storage
    ///
    /// If the store refuses the table the catalog entry is withdrawn again.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        temporary: bool,
    ) -> Result<Arc<TableData>> {
        let columns = self.catalog.create_table(name, columns, temporary)?;
        match self.store.create_table(name, columns, !temporary) {
            Ok(data) => Ok(data),
            Err(e) => {
                self.catalog.remove_table(name);
                Err(e)
            }
        }
    }

    /// Get a table's live data, loading it from storage on first use
    pub fn open_table(&self, name: &str) -> Result<Arc<TableData>> {
        if let Some(data) = self.store.get(name) {
            return Ok(data);
        }
        let schema = self
            .catalog
            .table(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        self.store
            .load_table(name, schema.columns().to_vec(), !schema.temporary)
    }

    /// Drop strings no persisted table references from the string pool
    ///
    /// Every persisted table is loaded first so that all of them are
    /// rewritten against the rebuilt pool.
    pub fn compact_strings(&self) -> Result<usize> {
        for name in self.catalog.table_names() {
            if self.catalog.table(&name).is_some_and(|t| !t.temporary) {
                self.open_table(&name)?;
            }
        }
        self.store.compact_strings()
    }

    /// Physically release a table whose hold count reached zero
    ///
    /// Session-only columns and tables leave the catalog with it, so the
    /// catalog keeps describing exactly what a reload would produce.
    pub fn free_table(&self, name: &str) -> Result<()> {
        self.store.free_table(name)?;
        let purged = self.catalog.purge_temporary(name);
        debug!(table = name, purged = purged.len(), "released table");
        Ok(())
    }
}
