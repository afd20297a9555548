//! Table store
//!
//! `TableStore` owns the container, the string pool and every table that is
//! currently loaded. Views never own tables: they hold `Arc<TableData>`
//! handles, and the store decides when a table is released.
//!
//! A table's hold count is kept on the `TableData` itself so any holder can
//! inspect it. When the store frees a table it marks the data released;
//! handles that outlive the release see `is_released()` and must not serve
//! its rows.

use crate::codec::{decode_rows, encode_rows, is_stream_cell_of};
use crate::container::Container;
use crate::string_pool::{StringPool, STRING_DATA_STREAM, STRING_POOL_STREAM};
use msidb_common::{ColumnDescriptor, Error, Ordinal, Result, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Rows and physical layout of a single table
#[derive(Debug)]
pub struct TableData {
    name: String,
    persistent: bool,
    /// Columns in ordinal order
    columns: RwLock<Vec<ColumnDescriptor>>,
    rows: RwLock<Vec<Vec<Value>>>,
    holds: AtomicUsize,
    released: AtomicBool,
}

impl TableData {
    pub fn new(name: &str, columns: Vec<ColumnDescriptor>, persistent: bool) -> Self {
        TableData {
            name: name.to_string(),
            persistent,
            columns: RwLock::new(columns),
            rows: RwLock::new(Vec::new()),
            holds: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Fail with `ViewInvalid` once the store has released this table
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::ViewInvalid(self.name.clone()));
        }
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }

    // ============================================
    // Hold count
    // ============================================

    pub fn hold_count(&self) -> usize {
        self.holds.load(Ordering::Acquire)
    }

    /// Increment the hold count, returning the new count
    pub fn add_ref(&self) -> usize {
        self.holds.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the hold count, returning the new count
    ///
    /// The count never goes below zero.
    pub fn release(&self) -> usize {
        let previous = self
            .holds
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    // ============================================
    // Layout
    // ============================================

    /// Snapshot of the column descriptors, in ordinal order
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.columns.read().clone()
    }

    pub fn column_count(&self) -> usize {
        self.columns.read().len()
    }

    /// Column by 1-based ordinal
    pub fn column(&self, ordinal: usize) -> Option<ColumnDescriptor> {
        if ordinal == 0 {
            return None;
        }
        self.columns.read().get(ordinal - 1).cloned()
    }

    /// 0-based indexes of the columns written to the container
    fn persisted_columns(columns: &[ColumnDescriptor]) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.temporary)
            .map(|(i, _)| i)
            .collect()
    }

    // ============================================
    // Rows
    // ============================================

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Copy of one row
    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        self.rows.read().get(row).cloned()
    }

    /// Copy of one cell; `col` is 1-based
    pub fn cell(&self, row: usize, col: usize) -> Option<Value> {
        if col == 0 {
            return None;
        }
        self.rows.read().get(row).and_then(|r| r.get(col - 1)).cloned()
    }

    /// First row at or after `start` whose column `col` (1-based) equals `value`
    pub fn find_from(&self, col: usize, value: &Value, start: usize) -> Option<usize> {
        if col == 0 {
            return None;
        }
        self.rows
            .read()
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, r)| r.get(col - 1) == Some(value))
            .map(|(i, _)| i)
    }

    /// Get all rows
    pub fn scan(&self) -> Vec<Vec<Value>> {
        self.rows.read().clone()
    }

    /// Append a row
    pub fn insert(&self, row: Vec<Value>) -> usize {
        let mut rows = self.rows.write();
        rows.push(row);
        rows.len() - 1
    }

    /// Replace a row in place
    pub fn update(&self, row: usize, values: Vec<Value>) -> bool {
        match self.rows.write().get_mut(row) {
            Some(slot) => {
                *slot = values;
                true
            }
            None => false,
        }
    }

    /// Remove a row, shifting later rows down
    pub fn delete(&self, row: usize) -> bool {
        let mut rows = self.rows.write();
        if row < rows.len() {
            rows.remove(row);
            true
        } else {
            false
        }
    }

    fn replace_rows(&self, rows: Vec<Vec<Value>>) {
        *self.rows.write() = rows;
    }
}

/// Storage for all loaded tables, backed by a container
pub struct TableStore {
    container: Mutex<Box<dyn Container>>,
    pool: Mutex<StringPool>,
    tables: RwLock<HashMap<String, Arc<TableData>>>,
}

impl TableStore {
    /// Wrap a container, loading its string pool if it has one
    pub fn open(container: Box<dyn Container>, codepage: u32) -> Result<Self> {
        let pool = match (
            container.read_stream(STRING_POOL_STREAM)?,
            container.read_stream(STRING_DATA_STREAM)?,
        ) {
            (Some(pool), Some(data)) => StringPool::decode(&pool, &data)?,
            (None, None) => StringPool::new(codepage),
            _ => {
                return Err(Error::CorruptedStream {
                    stream: STRING_POOL_STREAM.to_string(),
                    message: "string pool is missing one of its two streams".to_string(),
                })
            }
        };

        debug!(strings = pool.len(), codepage = pool.codepage(), "opened table store");

        Ok(TableStore {
            container: Mutex::new(container),
            pool: Mutex::new(pool),
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Get a loaded table
    pub fn get(&self, name: &str) -> Option<Arc<TableData>> {
        self.tables.read().get(name).cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Create a new, empty table
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        persistent: bool,
    ) -> Result<Arc<TableData>> {
        if self.is_loaded(name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        let data = Arc::new(TableData::new(name, columns, persistent));
        if persistent {
            self.flush_table(&data)?;
        }
        self.tables.write().insert(name.to_string(), data.clone());
        debug!(table = name, persistent, "created table");
        Ok(data)
    }

    /// Get a loaded table, or load it from its stream using `columns` as its layout
    pub fn load_table(
        &self,
        name: &str,
        columns: Vec<ColumnDescriptor>,
        persistent: bool,
    ) -> Result<Arc<TableData>> {
        if let Some(data) = self.get(name) {
            return Ok(data);
        }

        let data = TableData::new(name, columns, persistent);
        if persistent {
            let stream = self.container.lock().read_stream(name)?;
            if let Some(bytes) = stream {
                let width = data.column_count();
                let pool = self.pool.lock();
                let container = self.container.lock();
                let rows = decode_rows(name, &bytes, width, &pool, |s| container.read_stream(s))?;
                data.replace_rows(rows);
            }
        }

        let data = Arc::new(data);
        self.tables.write().insert(name.to_string(), data.clone());
        trace!(table = name, rows = data.row_count(), "loaded table");
        Ok(data)
    }

    /// Physically add a column to a loaded table
    ///
    /// Every existing row gains the column's default value. For persisted
    /// columns the table stream is rewritten before the in-memory layout
    /// changes, so a storage failure leaves the table exactly as it was.
    pub fn add_column(&self, table: &TableData, column: ColumnDescriptor) -> Result<()> {
        table.ensure_live()?;

        let expected = table.column_count() as Ordinal + 1;
        if column.ordinal != expected {
            return Err(Error::BadSchema(format!(
                "column {}.{} has ordinal {}, expected {}",
                table.name(),
                column.name,
                column.ordinal,
                expected
            )));
        }

        let default = column.column_type.default_value();
        let mut rows = table.scan();
        for row in rows.iter_mut() {
            row.push(default.clone());
        }
        let mut columns = table.columns();
        let persisted = table.is_persistent() && !column.temporary;
        columns.push(column);

        if persisted {
            self.write_table_image(table.name(), &rows, &columns)?;
        }

        *table.columns.write() = columns;
        table.replace_rows(rows);
        debug!(table = table.name(), columns = table.column_count(), "added column");
        Ok(())
    }

    /// Physically remove a column from a loaded table, renumbering later columns
    pub fn remove_column(&self, table: &TableData, ordinal: Ordinal) -> Result<ColumnDescriptor> {
        let idx = ordinal as usize;
        if idx == 0 || idx > table.column_count() {
            return Err(Error::OutOfRange {
                index: idx,
                limit: table.column_count(),
            });
        }

        let mut columns = table.columns();
        let removed = columns.remove(idx - 1);
        for (i, column) in columns.iter_mut().enumerate() {
            column.ordinal = i as Ordinal + 1;
        }
        let mut rows = table.scan();
        for row in rows.iter_mut() {
            if idx - 1 < row.len() {
                row.remove(idx - 1);
            }
        }

        if table.is_persistent() && !removed.temporary {
            self.write_table_image(table.name(), &rows, &columns)?;
        }

        *table.columns.write() = columns;
        table.replace_rows(rows);
        debug!(table = table.name(), column = %removed.name, "removed column");
        Ok(removed)
    }

    /// Write a table's persisted columns to its stream
    pub fn flush_table(&self, table: &TableData) -> Result<()> {
        if !table.is_persistent() {
            return Ok(());
        }
        let rows = table.scan();
        let columns = table.columns();
        self.write_table_image(table.name(), &rows, &columns)
    }

    fn write_table_image(
        &self,
        name: &str,
        rows: &[Vec<Value>],
        columns: &[ColumnDescriptor],
    ) -> Result<()> {
        let persisted = TableData::persisted_columns(columns);
        let encoded = {
            let mut pool = self.pool.lock();
            encode_rows(name, rows, &persisted, &mut pool)?
        };

        let mut container = self.container.lock();
        let fresh: Vec<&str> = encoded.streams.iter().map(|(n, _)| n.as_str()).collect();
        for (stream, bytes) in &encoded.streams {
            container.write_stream(stream, bytes)?;
        }
        container.write_stream(name, &encoded.rows)?;

        let stale: Vec<String> = container
            .stream_names()
            .into_iter()
            .filter(|s| is_stream_cell_of(name, s) && !fresh.contains(&s.as_str()))
            .collect();
        for stream in stale {
            container.remove_stream(&stream)?;
        }

        trace!(table = name, rows = rows.len(), bytes = encoded.rows.len(), "wrote table stream");
        Ok(())
    }

    /// Release a loaded table
    ///
    /// Persisted tables are flushed first; the table is then dropped from
    /// the store and marked released so outstanding handles stop serving it.
    pub fn free_table(&self, name: &str) -> Result<Option<Arc<TableData>>> {
        let Some(data) = self.get(name) else {
            return Ok(None);
        };

        self.flush_table(&data)?;
        self.tables.write().remove(name);
        data.mark_released();
        debug!(table = name, "freed table");
        Ok(Some(data))
    }

    /// Read a raw stream from the container
    pub fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.container.lock().read_stream(name)
    }

    /// Write a raw stream to the container
    pub fn write_stream(&self, name: &str, data: &[u8]) -> Result<()> {
        self.container.lock().write_stream(name, data)
    }

    /// Run `f` with exclusive access to the string pool
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut StringPool) -> R) -> R {
        f(&mut self.pool.lock())
    }

    /// Rebuild the string pool from the loaded tables
    ///
    /// Strings no longer referenced by any loaded persisted table are
    /// dropped and the survivors get fresh ids. Every persisted table must be
    /// loaded first: a table left on disk would keep ids from the old pool.
    /// Strings the caller writes after this call, such as catalog rows, are
    /// interned into the rebuilt pool. Returns how many strings were dropped.
    pub fn compact_strings(&self) -> Result<usize> {
        let before = {
            let mut pool = self.pool.lock();
            let before = pool.len();
            *pool = StringPool::new(pool.codepage());
            before
        };

        // A failed flush leaves the rebuilt pool in place; loaded rows are
        // flushed again before any table stream is read back.
        let tables: Vec<Arc<TableData>> = self.tables.read().values().cloned().collect();
        for table in &tables {
            self.flush_table(table)?;
        }

        let dropped = before.saturating_sub(self.pool.lock().len());
        debug!(dropped, "compacted string pool");
        Ok(dropped)
    }

    /// Flush every loaded persisted table, write the string pool and commit the container
    pub fn commit(&self) -> Result<()> {
        let tables: Vec<Arc<TableData>> = self.tables.read().values().cloned().collect();
        for table in &tables {
            self.flush_table(table)?;
        }

        let (pool_bytes, data_bytes) = self.pool.lock().encode();
        let mut container = self.container.lock();
        container.write_stream(STRING_POOL_STREAM, &pool_bytes)?;
        container.write_stream(STRING_DATA_STREAM, &data_bytes)?;
        container.commit()?;

        debug!(tables = tables.len(), "committed table store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemoryContainer;
    use msidb_common::ColumnType;

    fn columns(table: &str) -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new(table, "Id", ColumnType::Int32).with_ordinal(1),
            ColumnDescriptor::new(table, "Name", ColumnType::String(0)).with_ordinal(2),
        ]
    }

    fn store() -> TableStore {
        TableStore::open(Box::new(MemoryContainer::new()), 0).unwrap()
    }

    #[test]
    fn test_table_storage() {
        let store = store();
        let table = store.create_table("test", columns("test"), true).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("a")]);
        table.insert(vec![Value::Integer(2), Value::from("b")]);

        let rows = table.scan();
        assert_eq!(rows.len(), 2);
        assert_eq!(table.cell(1, 2), Some(Value::from("b")));
        assert_eq!(table.cell(1, 0), None);
    }

    #[test]
    fn test_create_twice_fails() {
        let store = store();
        store.create_table("test", columns("test"), false).unwrap();
        assert!(matches!(
            store.create_table("test", columns("test"), false),
            Err(Error::TableAlreadyExists(_))
        ));
    }

    #[test]
    fn test_table_delete() {
        let store = store();
        let table = store.create_table("test", columns("test"), false).unwrap();
        table.insert(vec![Value::Integer(1), Value::Null]);
        table.insert(vec![Value::Integer(2), Value::Null]);
        table.insert(vec![Value::Integer(3), Value::Null]);

        assert!(table.delete(1));
        assert!(!table.delete(5));
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 1), Some(Value::Integer(3)));
    }

    #[test]
    fn test_hold_count_never_underflows() {
        let table = TableData::new("t", Vec::new(), false);
        assert_eq!(table.add_ref(), 1);
        assert_eq!(table.add_ref(), 2);
        assert_eq!(table.release(), 1);
        assert_eq!(table.release(), 0);
        assert_eq!(table.release(), 0);
        assert_eq!(table.hold_count(), 0);
    }

    #[test]
    fn test_add_column_extends_rows() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("a")]);

        let column = ColumnDescriptor::new("t", "Extra", ColumnType::Int16).with_ordinal(3);
        store.add_column(&table, column).unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row(0).unwrap().len(), 3);
        assert_eq!(table.cell(0, 3), Some(Value::Null));
    }

    #[test]
    fn test_add_column_rejects_wrong_ordinal() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        let column = ColumnDescriptor::new("t", "Extra", ColumnType::Int16).with_ordinal(5);
        assert!(matches!(
            store.add_column(&table, column),
            Err(Error::BadSchema(_))
        ));
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_remove_column_renumbers() {
        let store = store();
        let table = store.create_table("t", columns("t"), false).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("a")]);

        let removed = store.remove_column(&table, 1).unwrap();
        assert_eq!(removed.name, "Id");
        assert_eq!(table.column(1).unwrap().name, "Name");
        assert_eq!(table.column(1).unwrap().ordinal, 1);
        assert_eq!(table.row(0).unwrap(), vec![Value::from("a")]);
    }

    #[test]
    fn test_free_and_reload_persisted_table() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        table.insert(vec![Value::Integer(7), Value::from("seven")]);

        let freed = store.free_table("t").unwrap().unwrap();
        assert!(freed.is_released());
        assert!(matches!(freed.ensure_live(), Err(Error::ViewInvalid(_))));
        assert!(!store.is_loaded("t"));

        let reloaded = store.load_table("t", columns("t"), true).unwrap();
        assert!(!reloaded.is_released());
        assert_eq!(reloaded.row(0).unwrap(), vec![Value::Integer(7), Value::from("seven")]);
    }

    #[test]
    fn test_temporary_columns_are_not_persisted() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("a")]);
        let temp = ColumnDescriptor::new("t", "Scratch", ColumnType::Int32)
            .with_ordinal(3)
            .with_temporary(true);
        store.add_column(&table, temp).unwrap();
        table.update(0, vec![Value::Integer(1), Value::from("a"), Value::Integer(99)]);

        store.free_table("t").unwrap();
        let reloaded = store.load_table("t", columns("t"), true).unwrap();
        assert_eq!(reloaded.row(0).unwrap(), vec![Value::Integer(1), Value::from("a")]);
    }

    #[test]
    fn test_commit_writes_string_pool() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("pooled")]);
        store.commit().unwrap();

        let pool = store.read_stream(STRING_POOL_STREAM).unwrap().unwrap();
        let data = store.read_stream(STRING_DATA_STREAM).unwrap().unwrap();
        let decoded = StringPool::decode(&pool, &data).unwrap();
        assert!(decoded.lookup("pooled").is_some());
    }

    #[test]
    fn test_stream_cells_survive_free() {
        let store = store();
        let cols = vec![
            ColumnDescriptor::new("Binary", "Name", ColumnType::String(0)).with_ordinal(1),
            ColumnDescriptor::new("Binary", "Data", ColumnType::Stream).with_ordinal(2),
        ];
        let table = store.create_table("Binary", cols.clone(), true).unwrap();
        table.insert(vec![Value::from("logo"), Value::Stream(vec![9, 9])]);
        store.free_table("Binary").unwrap();

        let reloaded = store.load_table("Binary", cols, true).unwrap();
        assert_eq!(reloaded.cell(0, 2), Some(Value::Stream(vec![9, 9])));
    }

    #[test]
    fn test_find_from_resumes() {
        let store = store();
        let table = store.create_table("t", columns("t"), false).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("x")]);
        table.insert(vec![Value::Integer(2), Value::from("y")]);
        table.insert(vec![Value::Integer(3), Value::from("x")]);

        let x = Value::from("x");
        assert_eq!(table.find_from(2, &x, 0), Some(0));
        assert_eq!(table.find_from(2, &x, 1), Some(2));
        assert_eq!(table.find_from(2, &x, 3), None);
        assert_eq!(table.find_from(0, &x, 0), None);
    }

    #[test]
    fn test_compact_strings_drops_replaced_values() {
        let store = store();
        let table = store.create_table("t", columns("t"), true).unwrap();
        table.insert(vec![Value::Integer(1), Value::from("draft")]);
        store.commit().unwrap();
        table.update(0, vec![Value::Integer(1), Value::from("final")]);
        store.commit().unwrap();
        assert!(store.with_pool(|p| p.lookup("draft")).is_some());

        assert_eq!(store.compact_strings().unwrap(), 1);
        assert!(store.with_pool(|p| p.lookup("draft")).is_none());
        store.commit().unwrap();

        store.free_table("t").unwrap();
        let reloaded = store.load_table("t", columns("t"), true).unwrap();
        assert_eq!(reloaded.cell(0, 2), Some(Value::from("final")));
    }
}
