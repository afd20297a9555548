//! msidb - An embedded installer database engine
//!
//! msidb stores installation metadata as tables inside a single container
//! file. Tables are read and changed through views; `ALTER TABLE` is an
//! alter view that can add columns and keep a table alive across
//! statements.
//!
//! # Example
//!
//! ```rust
//! use msidb::{ColumnDescriptor, ColumnType, Database, Hold, TableLifetime};
//!
//! let db = Database::in_memory().unwrap();
//! db.create_table(
//!     "Widgets",
//!     vec![ColumnDescriptor::new("", "Id", ColumnType::Int32)],
//!     TableLifetime::Persistent,
//! )
//! .unwrap();
//!
//! let name = ColumnDescriptor::new("", "Name", ColumnType::String(0));
//! db.alter_table("Widgets", Some(name), Hold::None).unwrap();
//! assert_eq!(db.column_names("Widgets").unwrap(), vec!["Id", "Name"]);
//! ```

pub mod config;

pub use msidb_catalog as catalog;
pub use msidb_common as common;
pub use msidb_execution as execution;
pub use msidb_storage as storage;

pub use config::{DatabaseConfig, OpenMode};
pub use msidb_common::{ColumnDescriptor, ColumnInfo, ColumnType, Error, Record, Result, Value};
pub use msidb_execution::{AlterView, Hold, MatchCursor, ModifyMode, Query, TableView, View};
pub use msidb_storage::{Container, FileContainer, MemoryContainer};

use msidb_catalog::SchemaCatalog;
use msidb_execution::ExecutionContext;
use msidb_storage::TableStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a table outlives the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLifetime {
    Persistent,
    Temporary,
}

/// The main database instance
pub struct Database {
    ctx: ExecutionContext,
    config: DatabaseConfig,
}

impl Database {
    /// Open or create a database file
    pub fn open(path: &Path, config: DatabaseConfig) -> Result<Self> {
        let container = match config.mode {
            OpenMode::Create => FileContainer::create(path),
            OpenMode::Transact | OpenMode::ReadOnly => FileContainer::open(path)?,
        };
        debug!(path = %path.display(), mode = ?config.mode, "opening database");
        Self::with_container(Box::new(container), config)
    }

    /// Create a new in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::with_container(Box::new(MemoryContainer::new()), DatabaseConfig::default())
    }

    /// Open a database over any container
    pub fn with_container(container: Box<dyn Container>, config: DatabaseConfig) -> Result<Self> {
        let store = TableStore::open(container, config.codepage)?;
        let catalog = SchemaCatalog::load(&store)?;
        Ok(Database {
            ctx: ExecutionContext::new(Arc::new(store), Arc::new(catalog)),
            config,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The store and catalog, for building views directly
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Create a table with the given columns, numbered in order from 1
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        lifetime: TableLifetime,
    ) -> Result<()> {
        self.ctx
            .create_table(name, columns, lifetime == TableLifetime::Temporary)?;
        Ok(())
    }

    /// A query scanning one table
    pub fn table_view(&self, name: &str) -> Result<Query> {
        let view = TableView::new(self.ctx.clone(), name)?;
        Ok(Query::new(Box::new(view)))
    }

    /// Run `ALTER TABLE name [ADD column] [HOLD|FREE]`
    pub fn alter_table(
        &self,
        name: &str,
        column: Option<ColumnDescriptor>,
        hold: Hold,
    ) -> Result<()> {
        let view = AlterView::new(self.ctx.clone(), name, column, hold)?;
        let mut query = Query::new(Box::new(view));
        query.execute(None)
    }

    /// Drive an arbitrary view tree
    pub fn query(&self, view: Box<dyn View>) -> Query {
        Query::new(view)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.ctx.catalog().table_names()
    }

    /// Column names of a table in ordinal order
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .ctx
            .catalog()
            .columns(table)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Current hold count of a table; `None` if the table does not exist
    pub fn hold_count(&self, table: &str) -> Option<usize> {
        match self.ctx.store().get(table) {
            Some(data) => Some(data.hold_count()),
            None if self.ctx.catalog().table_exists(table) => Some(0),
            None => None,
        }
    }

    /// Write the catalog, every loaded table and the string pool, then commit the container
    ///
    /// The string pool is rebuilt first, so strings no table uses any more
    /// are not written.
    pub fn commit(&self) -> Result<()> {
        if self.config.is_read_only() {
            return Err(Error::AccessDenied(
                "database was opened read-only".to_string(),
            ));
        }
        self.ctx.compact_strings()?;
        self.ctx.catalog().save(self.ctx.store())?;
        self.ctx.store().commit()?;
        debug!(tables = self.ctx.catalog().table_names().len(), "committed database");
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.config.commit_on_drop && !self.config.is_read_only() {
            if let Err(e) = self.commit() {
                warn!(error = %e, "commit on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widgets() -> Database {
        let db = Database::in_memory().unwrap();
        db.create_table(
            "Widgets",
            vec![ColumnDescriptor::new("", "Id", ColumnType::Int32)],
            TableLifetime::Persistent,
        )
        .unwrap();
        db
    }

    #[test]
    fn test_create_and_list() {
        let db = widgets();
        assert_eq!(db.table_names(), vec!["Widgets"]);
        assert_eq!(db.column_names("Widgets").unwrap(), vec!["Id"]);
        assert_eq!(db.hold_count("Widgets"), Some(0));
        assert_eq!(db.hold_count("Gadgets"), None);
        assert!(matches!(
            db.column_names("Gadgets"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_read_only_refuses_commit() {
        let db = Database::with_container(
            Box::new(MemoryContainer::new()),
            DatabaseConfig::read_only(),
        )
        .unwrap();
        assert!(matches!(db.commit(), Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_temporary_table_disappears_on_release() {
        let db = Database::in_memory().unwrap();
        db.create_table(
            "Session",
            vec![ColumnDescriptor::new("", "Key", ColumnType::String(0))],
            TableLifetime::Temporary,
        )
        .unwrap();

        db.alter_table("Session", None, Hold::Keep).unwrap();
        db.alter_table("Session", None, Hold::Free).unwrap();
        assert!(db.table_names().is_empty());
        assert!(matches!(
            db.table_view("Session"),
            Err(Error::TableNotFound(_))
        ));
    }
}
