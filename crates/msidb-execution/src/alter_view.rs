//! ALTER TABLE
//!
//! An alter view wraps a table view. Executing it first adjusts the
//! table's hold count and then, when built with a column, adds that column.
//! The hold step runs first so that "create and hold, then add a column"
//! lands on the table as it stands after the hold.

use crate::context::ExecutionContext;
use crate::table_view::TableView;
use crate::view::{MatchCursor, ModifyMode, View};
use msidb_common::{ColumnDescriptor, ColumnInfo, Error, Ordinal, Record, Result, Value};
use tracing::{debug, trace};

/// Hold adjustment requested by an ALTER TABLE statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hold {
    #[default]
    None,
    /// Keep the table alive past this statement
    Keep,
    /// Drop one hold taken by an earlier statement
    Free,
}

/// Schema mutation and lifetime control for one table
pub struct AlterView {
    ctx: ExecutionContext,
    name: String,
    /// Cleared once a release drops the table's hold count to zero
    table: Option<TableView>,
    column: Option<ColumnDescriptor>,
    hold: Hold,
}

impl AlterView {
    /// Build an alter view over `name`
    ///
    /// Fails with `TableNotFound` if the table does not exist.
    pub fn new(
        ctx: ExecutionContext,
        name: &str,
        column: Option<ColumnDescriptor>,
        hold: Hold,
    ) -> Result<Self> {
        let table = TableView::new(ctx.clone(), name)?;
        let column = column.map(|mut c| {
            c.table = name.to_string();
            c
        });
        trace!(table = name, hold = ?hold, add_column = column.is_some(), "created alter view");
        Ok(AlterView {
            ctx,
            name: name.to_string(),
            table: Some(table),
            column,
            hold,
        })
    }

    /// The wrapped table view, unless the table has been released
    pub fn table(&self) -> Option<&TableView> {
        self.table.as_ref()
    }

    fn live_table(&self) -> Result<&TableView> {
        match &self.table {
            Some(table) if !table.is_released() => Ok(table),
            _ => Err(Error::ViewInvalid(self.name.clone())),
        }
    }

    fn unsupported<T>(&self) -> Result<T> {
        self.live_table()?;
        Err(Error::OperationUnsupported(self.kind()))
    }

    fn adjust_hold(&mut self) -> Result<()> {
        let table = self.live_table()?;
        match self.hold {
            Hold::None => {}
            Hold::Keep => {
                table.add_ref()?;
            }
            Hold::Free => {
                if table.release()? == 0 {
                    debug!(table = %self.name, "alter view dropped its table");
                    self.table = None;
                }
            }
        }
        Ok(())
    }

    fn add_column(&self, column: &ColumnDescriptor) -> Result<()> {
        let table = self.live_table()?;
        let catalog = self.ctx.catalog();

        if catalog.column_exists(&self.name, &column.name) {
            return Err(Error::BadSchema(format!(
                "column {} already exists in table {}",
                column.name, self.name
            )));
        }

        let ordinal = catalog.column_count(&self.name) as Ordinal + 1;
        let temporary = column.temporary || self.hold == Hold::Keep;
        let column = column
            .clone()
            .with_ordinal(ordinal)
            .with_temporary(temporary);

        table.add_column(&column)?;
        debug!(table = %self.name, column = %column.name, ordinal, temporary, "column added");
        Ok(())
    }
}

impl View for AlterView {
    fn kind(&self) -> &'static str {
        "alter"
    }

    fn fetch_int(&self, _row: usize, _col: usize) -> Result<i32> {
        self.unsupported()
    }

    fn fetch_stream(&self, _row: usize, _col: usize) -> Result<Vec<u8>> {
        self.unsupported()
    }

    fn get_row(&self, row: usize) -> Result<Record> {
        self.live_table()?.get_row(row)
    }

    fn execute(&mut self, params: Option<&Record>) -> Result<()> {
        trace!(table = %self.name, "alter view executing");
        self.adjust_hold()?;

        if let Some(table) = self.table.as_mut() {
            table.execute(params)?;
        }

        if let Some(column) = self.column.clone() {
            self.add_column(&column)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.live_table()?;
        Ok(())
    }

    fn get_dimensions(&self) -> Result<(usize, usize)> {
        self.unsupported()
    }

    fn get_column_info(&self, _index: usize) -> Result<ColumnInfo> {
        self.unsupported()
    }

    fn modify(&mut self, _mode: ModifyMode, _record: &mut Record, _row: usize) -> Result<()> {
        self.unsupported()
    }

    fn delete(self: Box<Self>) -> Result<()> {
        trace!(table = %self.name, "alter view deleted");
        match self.table {
            Some(table) => Box::new(table).delete(),
            None => Ok(()),
        }
    }

    fn find_matching_rows(&self, _col: usize, _value: &Value, _cursor: &mut MatchCursor) -> Result<usize> {
        self.unsupported()
    }
}
