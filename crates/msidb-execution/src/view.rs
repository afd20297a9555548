//! The view contract
//!
//! A view is one node of a compiled query plan. Clause views wrap the view
//! beneath them and own it exclusively, so a tree is a chain of
//! `Box<dyn View>`. Rows are addressed from 0 in physical order; columns and
//! record fields from 1.

use msidb_common::{ColumnInfo, Error, Record, Result, Value};

/// How `View::modify` should apply a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyMode {
    Seek,
    Refresh,
    Insert,
    Update,
    Assign,
    Replace,
    Merge,
    Delete,
    InsertTemporary,
    Validate,
    ValidateNew,
    ValidateField,
    ValidateDelete,
}

impl ModifyMode {
    /// Modes that address an existing row
    pub fn targets_row(&self) -> bool {
        matches!(
            self,
            ModifyMode::Refresh | ModifyMode::Update | ModifyMode::Delete
        )
    }
}

/// Resume point for `View::find_matching_rows`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCursor {
    next_row: usize,
}

impl MatchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row the next search starts from
    pub fn position(&self) -> usize {
        self.next_row
    }

    pub(crate) fn advance_past(&mut self, row: usize) {
        self.next_row = row + 1;
    }

    pub(crate) fn exhaust(&mut self, rows: usize) {
        self.next_row = self.next_row.max(rows);
    }

    pub fn reset(&mut self) {
        self.next_row = 0;
    }
}

/// A query-plan node
///
/// Calls a view does not support fail with `OperationUnsupported`, which
/// callers treat as non-fatal.
pub trait View: Send {
    /// Short name used in errors and logs
    fn kind(&self) -> &'static str;

    /// Read an integer cell
    fn fetch_int(&self, _row: usize, _col: usize) -> Result<i32> {
        Err(Error::OperationUnsupported(self.kind()))
    }

    /// Read a stream cell
    fn fetch_stream(&self, _row: usize, _col: usize) -> Result<Vec<u8>> {
        Err(Error::OperationUnsupported(self.kind()))
    }

    /// Copy one row into a record
    fn get_row(&self, row: usize) -> Result<Record>;

    /// Run the view once with optional bound parameters
    fn execute(&mut self, params: Option<&Record>) -> Result<()>;

    /// End the current execution
    fn close(&mut self) -> Result<()>;

    /// (rows, columns) of the executed view
    fn get_dimensions(&self) -> Result<(usize, usize)>;

    /// Describe output column `index` (1-based)
    fn get_column_info(&self, index: usize) -> Result<ColumnInfo>;

    /// Apply a record to the view's rows
    fn modify(&mut self, mode: ModifyMode, record: &mut Record, row: usize) -> Result<()>;

    /// Release the view and everything it owns
    fn delete(self: Box<Self>) -> Result<()>;

    /// Next row at or after the cursor whose column `col` equals `value`
    ///
    /// Returns `NotFound` once no further row matches.
    fn find_matching_rows(&self, _col: usize, _value: &Value, _cursor: &mut MatchCursor) -> Result<usize> {
        Err(Error::OperationUnsupported(self.kind()))
    }
}
