//! Query driver
//!
//! A `Query` owns the root of a view tree and walks it row by row. Dropping
//! the query deletes the tree.

use crate::view::{ModifyMode, View};
use msidb_common::{ColumnInfo, Error, Record, Result};
use tracing::{trace, warn};

/// Executes a view tree and fetches its rows in order
pub struct Query {
    view: Option<Box<dyn View>>,
    /// Next row `fetch` returns
    cursor: usize,
    executed: bool,
}

impl Query {
    pub fn new(view: Box<dyn View>) -> Self {
        Query {
            view: Some(view),
            cursor: 0,
            executed: false,
        }
    }

    fn view(&self) -> Result<&dyn View> {
        self.view
            .as_deref()
            .ok_or_else(|| Error::Internal("query has no view".to_string()))
    }

    fn view_mut(&mut self) -> Result<&mut (dyn View + 'static)> {
        self.view
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("query has no view".to_string()))
    }

    /// Execute the view tree, restarting the fetch position
    ///
    /// A previous execution is closed first.
    pub fn execute(&mut self, params: Option<&Record>) -> Result<()> {
        if self.executed {
            self.close()?;
        }
        let view = self.view_mut()?;
        trace!(kind = view.kind(), "executing query");
        view.execute(params)?;
        self.cursor = 0;
        self.executed = true;
        Ok(())
    }

    /// Fetch the next row, or `None` after the last one
    pub fn fetch(&mut self) -> Result<Option<Record>> {
        if !self.executed {
            return Err(Error::NotExecuted);
        }
        let view = self.view()?;
        let (rows, _) = view.get_dimensions()?;
        if self.cursor >= rows {
            return Ok(None);
        }
        let record = view.get_row(self.cursor)?;
        self.cursor += 1;
        Ok(Some(record))
    }

    /// Execute and call `f` for every row, returning how many rows were seen
    pub fn iterate<F>(&mut self, params: Option<&Record>, mut f: F) -> Result<usize>
    where
        F: FnMut(Record) -> Result<()>,
    {
        self.execute(params)?;
        let mut count = 0;
        while let Some(record) = self.fetch()? {
            f(record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Describe every output column
    pub fn column_info(&self) -> Result<Vec<ColumnInfo>> {
        let view = self.view()?;
        let mut columns = Vec::new();
        loop {
            match view.get_column_info(columns.len() + 1) {
                Ok(info) => columns.push(info),
                Err(Error::OutOfRange { .. }) => return Ok(columns),
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply `record` through the view
    ///
    /// Row-addressed modes act on the row most recently fetched.
    pub fn modify(&mut self, mode: ModifyMode, record: &mut Record) -> Result<()> {
        let row = if mode.targets_row() {
            match self.cursor.checked_sub(1) {
                Some(row) if self.executed => row,
                _ => return Err(Error::NotFound("no fetched row to modify".to_string())),
            }
        } else {
            0
        };

        self.view_mut()?.modify(mode, record, row)?;

        // Later rows shift down after a delete; fetch the next one next
        if mode == ModifyMode::Delete {
            self.cursor -= 1;
        }
        Ok(())
    }

    /// End the current execution
    pub fn close(&mut self) -> Result<()> {
        self.executed = false;
        self.cursor = 0;
        self.view_mut()?.close()
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        if let Some(view) = self.view.take() {
            if let Err(e) = view.delete() {
                warn!(error = %e, "failed to delete view tree");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alter_view::{AlterView, Hold};
    use crate::context::ExecutionContext;
    use crate::table_view::TableView;
    use msidb_catalog::SchemaCatalog;
    use msidb_common::{ColumnDescriptor, ColumnType, Value};
    use msidb_storage::{MemoryContainer, TableStore};
    use std::sync::Arc;

    fn context() -> ExecutionContext {
        let store = TableStore::open(Box::new(MemoryContainer::new()), 0).unwrap();
        let ctx = ExecutionContext::new(Arc::new(store), Arc::new(SchemaCatalog::new()));
        ctx.create_table(
            "Property",
            vec![
                ColumnDescriptor::new("", "Property", ColumnType::String(72)).with_nullable(false),
                ColumnDescriptor::new("", "Value", ColumnType::String(0)),
            ],
            false,
        )
        .unwrap();
        ctx
    }

    fn table_query(ctx: &ExecutionContext) -> Query {
        Query::new(Box::new(TableView::new(ctx.clone(), "Property").unwrap()))
    }

    fn insert(query: &mut Query, name: &str, value: &str) {
        let mut record = Record::from_values(vec![Value::from(name), Value::from(value)]);
        query.modify(ModifyMode::Insert, &mut record).unwrap();
    }

    #[test]
    fn test_fetch_before_execute() {
        let ctx = context();
        let mut query = table_query(&ctx);
        assert!(matches!(query.fetch(), Err(Error::NotExecuted)));
    }

    #[test]
    fn test_fetch_all_rows() {
        let ctx = context();
        let mut query = table_query(&ctx);
        insert(&mut query, "ProductName", "Widget Suite");
        insert(&mut query, "ProductVersion", "1.0.0");

        let mut names = Vec::new();
        let count = query
            .iterate(None, |record| {
                names.push(record.get_string(1)?.unwrap_or_default().to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(names, vec!["ProductName", "ProductVersion"]);
        assert!(query.fetch().unwrap().is_none());
    }

    #[test]
    fn test_modify_fetched_row() {
        let ctx = context();
        let mut query = table_query(&ctx);
        insert(&mut query, "A", "1");
        insert(&mut query, "B", "2");
        insert(&mut query, "C", "3");

        let mut record = Record::new(2);
        assert!(matches!(
            query.modify(ModifyMode::Update, &mut record),
            Err(Error::NotFound(_))
        ));

        query.execute(None).unwrap();
        let mut first = query.fetch().unwrap().unwrap();
        query.modify(ModifyMode::Delete, &mut first).unwrap();

        let mut next = query.fetch().unwrap().unwrap();
        assert_eq!(next.get_string(1).unwrap(), Some("B"));
        next.set(2, "two").unwrap();
        query.modify(ModifyMode::Update, &mut next).unwrap();

        query.execute(None).unwrap();
        let record = query.fetch().unwrap().unwrap();
        assert_eq!(record.get_string(2).unwrap(), Some("two"));
    }

    #[test]
    fn test_column_info() {
        let ctx = context();
        let query = table_query(&ctx);
        let names: Vec<String> = query
            .column_info()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Property", "Value"]);
    }

    #[test]
    fn test_alter_query_has_no_rows() {
        let ctx = context();
        let column = ColumnDescriptor::new("", "Comment", ColumnType::String(0));
        let view = AlterView::new(ctx.clone(), "Property", Some(column), Hold::None).unwrap();
        let mut query = Query::new(Box::new(view));

        query.execute(None).unwrap();
        assert!(matches!(
            query.fetch(),
            Err(Error::OperationUnsupported("alter"))
        ));
        assert!(matches!(
            query.column_info(),
            Err(Error::OperationUnsupported("alter"))
        ));
        drop(query);

        assert!(ctx.catalog().column_exists("Property", "Comment"));
    }
}
