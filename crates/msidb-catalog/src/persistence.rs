//! Reading and writing the `_Tables` and `_Columns` streams
//!
//! Row formats:
//! - `_Tables`: (Name)
//! - `_Columns`: (Table, Number, Name, Type)
//!
//! Strings go through the shared string pool like any other table. Only
//! persisted tables and columns are written, and ordinals are written as
//! each column's position among the persisted columns of its table.

use crate::{SchemaCatalog, TableSchema, COLUMNS_TABLE, TABLES_TABLE};
use msidb_common::{ColumnDescriptor, ColumnType, Error, Ordinal, Result, Value};
use msidb_storage::{decode_rows, encode_rows, TableStore};
use tracing::debug;

fn corrupt(stream: &str, message: String) -> Error {
    Error::CorruptedStream {
        stream: stream.to_string(),
        message,
    }
}

fn string_cell(stream: &str, row: &[Value], idx: usize) -> Result<String> {
    row[idx]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| corrupt(stream, format!("expected string in field {}", idx + 1)))
}

fn int_cell(stream: &str, row: &[Value], idx: usize) -> Result<i32> {
    row[idx]
        .as_i32()
        .ok_or_else(|| corrupt(stream, format!("expected integer in field {}", idx + 1)))
}

impl SchemaCatalog {
    /// Rebuild the catalog from a store's reserved streams
    ///
    /// A store with no catalog streams yields an empty catalog.
    pub fn load(store: &TableStore) -> Result<Self> {
        let catalog = SchemaCatalog::new();

        let table_rows = read_rows(store, TABLES_TABLE, 1)?;
        let column_rows = read_rows(store, COLUMNS_TABLE, 4)?;

        let mut tables = catalog.tables.write();
        for row in &table_rows {
            let name = string_cell(TABLES_TABLE, row, 0)?;
            tables.insert(name.clone(), TableSchema::new(&name, false));
        }

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let table = string_cell(COLUMNS_TABLE, row, 0)?;
            let number = int_cell(COLUMNS_TABLE, row, 1)?;
            let name = string_cell(COLUMNS_TABLE, row, 2)?;
            let tag = int_cell(COLUMNS_TABLE, row, 3)?;
            let (column_type, nullable, temporary) = ColumnType::from_tag(tag as u32)?;
            columns.push(ColumnDescriptor {
                table,
                name,
                ordinal: number as Ordinal,
                column_type,
                nullable,
                temporary,
            });
        }
        columns.sort_by(|a, b| (&a.table, a.ordinal).cmp(&(&b.table, b.ordinal)));

        for column in columns {
            let schema = tables.get_mut(&column.table).ok_or_else(|| {
                corrupt(
                    COLUMNS_TABLE,
                    format!("column {} refers to unknown table {}", column.name, column.table),
                )
            })?;
            let expected = schema.column_count() as Ordinal + 1;
            if column.ordinal != expected || schema.has_column(&column.name) {
                return Err(corrupt(
                    COLUMNS_TABLE,
                    format!(
                        "column {}.{} has ordinal {}, expected {}",
                        column.table, column.name, column.ordinal, expected
                    ),
                ));
            }
            schema.push(column);
        }

        debug!(tables = tables.len(), columns = column_rows.len(), "loaded catalog");
        drop(tables);
        Ok(catalog)
    }

    /// Write the persisted part of the catalog to the reserved streams
    pub fn save(&self, store: &TableStore) -> Result<()> {
        let tables = self.tables.read();
        let mut names: Vec<&String> = tables
            .iter()
            .filter(|(_, t)| !t.temporary)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        let mut table_rows = Vec::with_capacity(names.len());
        let mut column_rows = Vec::new();
        for name in names {
            table_rows.push(vec![Value::String(name.clone())]);
            let persisted = tables[name].columns().iter().filter(|c| !c.temporary);
            for (i, column) in persisted.enumerate() {
                column_rows.push(vec![
                    Value::String(column.table.clone()),
                    Value::Integer(i as i32 + 1),
                    Value::String(column.name.clone()),
                    Value::Integer(column.type_tag() as i32),
                ]);
            }
        }
        drop(tables);

        write_rows(store, TABLES_TABLE, &table_rows, 1)?;
        write_rows(store, COLUMNS_TABLE, &column_rows, 4)?;
        debug!(tables = table_rows.len(), columns = column_rows.len(), "saved catalog");
        Ok(())
    }
}

fn read_rows(store: &TableStore, stream: &str, width: usize) -> Result<Vec<Vec<Value>>> {
    match store.read_stream(stream)? {
        Some(bytes) => store.with_pool(|pool| decode_rows(stream, &bytes, width, pool, |_| Ok(None))),
        None => Ok(Vec::new()),
    }
}

fn write_rows(store: &TableStore, stream: &str, rows: &[Vec<Value>], width: usize) -> Result<()> {
    let columns: Vec<usize> = (0..width).collect();
    let encoded = store.with_pool(|pool| encode_rows(stream, rows, &columns, pool))?;
    store.write_stream(stream, &encoded.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msidb_storage::MemoryContainer;

    fn store() -> TableStore {
        TableStore::open(Box::new(MemoryContainer::new()), 0).unwrap()
    }

    #[test]
    fn test_save_load_catalog() {
        let store = store();
        let catalog = SchemaCatalog::new();
        catalog
            .create_table(
                "Feature",
                vec![
                    ColumnDescriptor::new("", "Feature", ColumnType::String(38)).with_nullable(false),
                    ColumnDescriptor::new("", "Level", ColumnType::Int16),
                ],
                false,
            )
            .unwrap();
        catalog
            .create_table(
                "Scratch",
                vec![ColumnDescriptor::new("", "X", ColumnType::Int32)],
                true,
            )
            .unwrap();
        catalog.save(&store).unwrap();

        let loaded = SchemaCatalog::load(&store).unwrap();
        assert_eq!(loaded.table_names(), vec!["Feature".to_string()]);
        let columns = loaded.columns("Feature").unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "Feature");
        assert_eq!(columns[0].column_type, ColumnType::String(38));
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].ordinal, 2);
    }

    #[test]
    fn test_save_compacts_ordinals_around_temporary_columns() {
        let store = store();
        let catalog = SchemaCatalog::new();
        catalog
            .create_table("T", vec![ColumnDescriptor::new("", "A", ColumnType::Int16)], false)
            .unwrap();
        catalog
            .append_column(
                ColumnDescriptor::new("T", "Tmp", ColumnType::Int16)
                    .with_ordinal(2)
                    .with_temporary(true),
            )
            .unwrap();
        catalog
            .append_column(ColumnDescriptor::new("T", "B", ColumnType::Int16).with_ordinal(3))
            .unwrap();
        catalog.save(&store).unwrap();

        let loaded = SchemaCatalog::load(&store).unwrap();
        let names: Vec<(String, Ordinal)> = loaded
            .columns("T")
            .unwrap()
            .into_iter()
            .map(|c| (c.name, c.ordinal))
            .collect();
        assert_eq!(names, vec![("A".to_string(), 1), ("B".to_string(), 2)]);
    }

    #[test]
    fn test_load_empty_store() {
        let store = store();
        let catalog = SchemaCatalog::load(&store).unwrap();
        assert!(catalog.table_names().is_empty());
    }

    #[test]
    fn test_load_rejects_orphan_columns() {
        let store = store();
        let rows = vec![vec![
            Value::from("Ghost"),
            Value::Integer(1),
            Value::from("X"),
            Value::Integer(ColumnType::Int16.to_tag(true, false) as i32),
        ]];
        write_rows(&store, COLUMNS_TABLE, &rows, 4).unwrap();

        assert!(matches!(
            SchemaCatalog::load(&store),
            Err(Error::CorruptedStream { .. })
        ));
    }
}
