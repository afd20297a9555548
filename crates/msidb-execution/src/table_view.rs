//! Table view: a physical scan of one stored table

use crate::context::ExecutionContext;
use crate::view::{MatchCursor, ModifyMode, View};
use msidb_common::{
    ColumnDescriptor, ColumnInfo, Error, Record, Result, Value, NULL_INTEGER,
};
use msidb_storage::TableData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Scan over a stored table
///
/// The view references the table through a shared handle; it never owns
/// the rows. Once the store releases the table every call fails with
/// `ViewInvalid`.
pub struct TableView {
    ctx: ExecutionContext,
    name: String,
    table: Arc<TableData>,
    executed: bool,
}

impl TableView {
    /// Open a view over `name`, loading the table if needed
    pub fn new(ctx: ExecutionContext, name: &str) -> Result<Self> {
        let table = ctx.open_table(name)?;
        table.ensure_live()?;
        Ok(TableView {
            ctx,
            name: name.to_string(),
            table,
            executed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared table handle
    pub fn table(&self) -> &Arc<TableData> {
        &self.table
    }

    /// Current hold count of the table
    pub fn hold_count(&self) -> usize {
        self.table.hold_count()
    }

    pub fn is_released(&self) -> bool {
        self.table.is_released()
    }

    /// Keep the table alive past the current statement
    pub fn add_ref(&self) -> Result<usize> {
        self.table.ensure_live()?;
        let holds = self.table.add_ref();
        debug!(table = %self.name, holds, "table held");
        Ok(holds)
    }

    /// Drop one hold; at zero the table is physically released
    pub fn release(&self) -> Result<usize> {
        self.table.ensure_live()?;
        let holds = self.table.release();
        debug!(table = %self.name, holds, "table hold released");
        if holds == 0 {
            if let Err(e) = self.ctx.free_table(&self.name) {
                // The table is still loaded, so the hold it had is still in force
                let restored = self.table.add_ref();
                warn!(table = %self.name, holds = restored, error = %e, "release failed, hold restored");
                return Err(e);
            }
        }
        Ok(holds)
    }

    /// Add a column to the table and record it in the catalog
    ///
    /// Every existing row gains the column's default value. The catalog row
    /// is appended only after the physical layout has been written; if the
    /// append is refused the physical column is taken out again.
    pub fn add_column(&self, column: &ColumnDescriptor) -> Result<()> {
        self.table.ensure_live()?;
        if column.table != self.name {
            return Err(Error::BadSchema(format!(
                "column {} belongs to table {}, not {}",
                column.name, column.table, self.name
            )));
        }

        self.ctx.store().add_column(&self.table, column.clone())?;

        if let Err(e) = self.ctx.catalog().append_column(column.clone()) {
            warn!(table = %self.name, column = %column.name, error = %e, "catalog refused column, rolling back");
            if let Err(rollback) = self.ctx.store().remove_column(&self.table, column.ordinal) {
                warn!(table = %self.name, column = %column.name, error = %rollback, "rollback of physical column failed");
            }
            return Err(e);
        }
        Ok(())
    }

    fn check_executed(&self) -> Result<()> {
        self.table.ensure_live()?;
        if !self.executed {
            return Err(Error::NotExecuted);
        }
        Ok(())
    }

    fn cell(&self, row: usize, col: usize) -> Result<(ColumnDescriptor, Value)> {
        self.table.ensure_live()?;
        let column = self.table.column(col).ok_or(Error::OutOfRange {
            index: col,
            limit: self.table.column_count(),
        })?;
        let value = self.table.cell(row, col).ok_or(Error::OutOfRange {
            index: row,
            limit: self.table.row_count(),
        })?;
        Ok((column, value))
    }

    /// Check a record against the table layout
    fn validate(&self, record: &Record) -> Result<()> {
        let columns = self.table.columns();
        if record.field_count() != columns.len() {
            return Err(Error::OutOfRange {
                index: record.field_count(),
                limit: columns.len(),
            });
        }
        for (column, value) in columns.iter().zip(record.values()) {
            if !column.accepts(value) {
                let expected = if column.nullable {
                    column.column_type.to_string()
                } else {
                    format!("{} NOT NULL", column.column_type)
                };
                return Err(Error::DatatypeMismatch {
                    column: column.name.clone(),
                    expected,
                    got: value.kind_name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<()> {
        let rows = self.table.row_count();
        if row >= rows {
            return Err(Error::OutOfRange { index: row, limit: rows });
        }
        Ok(())
    }
}

impl View for TableView {
    fn kind(&self) -> &'static str {
        "table"
    }

    fn fetch_int(&self, row: usize, col: usize) -> Result<i32> {
        let (column, value) = self.cell(row, col)?;
        match value {
            Value::Integer(i) => Ok(i),
            Value::Null => Ok(NULL_INTEGER),
            other => Err(Error::DatatypeMismatch {
                column: column.name,
                expected: "integer".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    fn fetch_stream(&self, row: usize, col: usize) -> Result<Vec<u8>> {
        let (column, value) = self.cell(row, col)?;
        match value {
            Value::Stream(bytes) => Ok(bytes),
            Value::Null => Err(Error::NotFound(format!(
                "{}.{} row {}",
                self.name, column.name, row
            ))),
            other => Err(Error::DatatypeMismatch {
                column: column.name,
                expected: "stream".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    fn get_row(&self, row: usize) -> Result<Record> {
        self.check_executed()?;
        let values = self.table.row(row).ok_or(Error::OutOfRange {
            index: row,
            limit: self.table.row_count(),
        })?;
        Ok(Record::from_values(values))
    }

    fn execute(&mut self, _params: Option<&Record>) -> Result<()> {
        self.table.ensure_live()?;
        trace!(table = %self.name, rows = self.table.row_count(), "table view executed");
        self.executed = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.executed = false;
        Ok(())
    }

    fn get_dimensions(&self) -> Result<(usize, usize)> {
        self.check_executed()?;
        Ok((self.table.row_count(), self.table.column_count()))
    }

    fn get_column_info(&self, index: usize) -> Result<ColumnInfo> {
        self.table.ensure_live()?;
        self.table
            .column(index)
            .map(|c| ColumnInfo::from(&c))
            .ok_or(Error::OutOfRange {
                index,
                limit: self.table.column_count(),
            })
    }

    fn modify(&mut self, mode: ModifyMode, record: &mut Record, row: usize) -> Result<()> {
        self.table.ensure_live()?;
        if mode.targets_row() {
            self.check_row(row)?;
        }

        match mode {
            ModifyMode::Insert => {
                self.validate(record)?;
                let row = self.table.insert(record.values().to_vec());
                trace!(table = %self.name, row, "inserted row");
            }
            ModifyMode::Update => {
                self.validate(record)?;
                self.table.update(row, record.values().to_vec());
            }
            ModifyMode::Delete => {
                self.table.delete(row);
            }
            ModifyMode::Refresh => {
                if let Some(values) = self.table.row(row) {
                    *record = Record::from_values(values);
                }
            }
            _ => return Err(Error::OperationUnsupported(self.kind())),
        }
        Ok(())
    }

    fn delete(self: Box<Self>) -> Result<()> {
        trace!(table = %self.name, holds = self.table.hold_count(), "table view deleted");
        Ok(())
    }

    fn find_matching_rows(&self, col: usize, value: &Value, cursor: &mut MatchCursor) -> Result<usize> {
        self.table.ensure_live()?;
        let limit = self.table.column_count();
        if col == 0 || col > limit {
            return Err(Error::OutOfRange { index: col, limit });
        }

        match self.table.find_from(col, value, cursor.position()) {
            Some(row) => {
                cursor.advance_past(row);
                Ok(row)
            }
            None => {
                cursor.exhaust(self.table.row_count());
                Err(Error::NotFound(format!("{} = {} in {}", col, value, self.name)))
            }
        }
    }
}
