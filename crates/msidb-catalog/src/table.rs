//! Per-table schema entries

use hashbrown::HashMap;
use msidb_common::{ColumnDescriptor, Ordinal};

/// Catalog entry for one table
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Temporary tables are never written to `_Tables`
    pub temporary: bool,
    /// Columns in ordinal order
    columns: Vec<ColumnDescriptor>,
    /// Column name -> index into `columns`
    by_name: HashMap<String, usize>,
}

impl TableSchema {
    pub fn new(name: &str, temporary: bool) -> Self {
        TableSchema {
            name: name.to_string(),
            temporary,
            columns: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns in ordinal order
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Append a column; the caller has checked name and ordinal
    pub(crate) fn push(&mut self, column: ColumnDescriptor) {
        self.by_name.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
    }

    /// Drop temporary columns and renumber the rest from 1
    pub(crate) fn retain_persistent(&mut self) -> Vec<ColumnDescriptor> {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.columns)
            .into_iter()
            .partition(|c| !c.temporary);

        self.by_name.clear();
        for mut column in kept {
            column.ordinal = self.columns.len() as Ordinal + 1;
            self.push(column);
        }
        removed
    }
}
