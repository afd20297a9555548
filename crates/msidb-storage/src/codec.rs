//! Row codec
//!
//! A table stream is a bincode-encoded list of rows, each a list of stored
//! cells. Strings are replaced by string pool ids. Stream cells only record
//! that a payload exists; the payload itself is written to a separate
//! container stream named `<table>.<row>.<position>`.

use crate::container::codec_error;
use crate::string_pool::{StringId, StringPool};
use msidb_common::{Error, Result, Value};
use serde::{Deserialize, Serialize};

/// On-disk form of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredCell {
    Null,
    Int(i32),
    Str(StringId),
    Stream,
}

/// Name of the container stream holding a stream cell's payload
pub fn stream_cell_name(table: &str, row: usize, position: usize) -> String {
    format!("{}.{}.{}", table, row, position)
}

/// Returns true if `stream` holds a stream cell belonging to `table`
pub fn is_stream_cell_of(table: &str, stream: &str) -> bool {
    stream
        .strip_prefix(table)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(|rest| {
            let mut parts = rest.split('.');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(r), Some(p), None) if r.parse::<usize>().is_ok() && p.parse::<usize>().is_ok()
            )
        })
        .unwrap_or(false)
}

/// Rows encoded for one table, plus the stream cell payloads they refer to
#[derive(Debug, Default)]
pub struct EncodedTable {
    pub rows: Vec<u8>,
    pub streams: Vec<(String, Vec<u8>)>,
}

/// Encode the cells at `columns` (0-based indexes into each row) of every row
pub fn encode_rows(
    table: &str,
    rows: &[Vec<Value>],
    columns: &[usize],
    pool: &mut StringPool,
) -> Result<EncodedTable> {
    let mut encoded = EncodedTable::default();
    let mut stored_rows = Vec::with_capacity(rows.len());

    for (row_idx, row) in rows.iter().enumerate() {
        let mut stored = Vec::with_capacity(columns.len());
        for (position, &col) in columns.iter().enumerate() {
            let cell = match row.get(col).unwrap_or(&Value::Null) {
                Value::Null => StoredCell::Null,
                Value::Integer(i) => StoredCell::Int(*i),
                Value::String(s) => StoredCell::Str(pool.intern(s)),
                Value::Stream(bytes) => {
                    encoded.streams.push((
                        stream_cell_name(table, row_idx, position + 1),
                        bytes.clone(),
                    ));
                    StoredCell::Stream
                }
            };
            stored.push(cell);
        }
        stored_rows.push(stored);
    }

    encoded.rows = bincode::serialize(&stored_rows).map_err(|e| codec_error(table, e))?;
    Ok(encoded)
}

/// Decode a table stream back into rows of `width` cells
///
/// Rows shorter than `width` are padded with NULL; this happens for tables
/// whose stream predates a column addition.
pub fn decode_rows<F>(
    table: &str,
    bytes: &[u8],
    width: usize,
    pool: &StringPool,
    mut read_stream: F,
) -> Result<Vec<Vec<Value>>>
where
    F: FnMut(&str) -> Result<Option<Vec<u8>>>,
{
    let stored_rows: Vec<Vec<StoredCell>> =
        bincode::deserialize(bytes).map_err(|e| codec_error(table, e))?;

    let mut rows = Vec::with_capacity(stored_rows.len());
    for (row_idx, stored) in stored_rows.into_iter().enumerate() {
        if stored.len() > width {
            return Err(Error::CorruptedStream {
                stream: table.to_string(),
                message: format!("row {} has {} cells, expected {}", row_idx, stored.len(), width),
            });
        }

        let mut row = Vec::with_capacity(width);
        for (position, cell) in stored.into_iter().enumerate() {
            let value = match cell {
                StoredCell::Null => Value::Null,
                StoredCell::Int(i) => Value::Integer(i),
                StoredCell::Str(id) => match pool.get(id) {
                    Some(s) => Value::String(s.to_string()),
                    None => {
                        return Err(Error::CorruptedStream {
                            stream: table.to_string(),
                            message: format!("row {} refers to unknown string id {}", row_idx, id),
                        })
                    }
                },
                StoredCell::Stream => {
                    let name = stream_cell_name(table, row_idx, position + 1);
                    match read_stream(&name)? {
                        Some(bytes) => Value::Stream(bytes),
                        None => return Err(Error::NotFound(name)),
                    }
                }
            };
            row.push(value);
        }
        row.resize(width, Value::Null);
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_strings_go_through_the_pool() {
        let mut pool = StringPool::new(0);
        let rows = vec![
            vec![Value::Integer(1), Value::from("alpha")],
            vec![Value::Integer(2), Value::from("alpha")],
        ];
        let encoded = encode_rows("T", &rows, &[0, 1], &mut pool).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.lookup("alpha"), Some(1));

        let decoded = decode_rows("T", &encoded.rows, 2, &pool, |_| Ok(None)).unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_only_selected_columns_are_encoded() {
        let mut pool = StringPool::new(0);
        let rows = vec![vec![
            Value::Integer(1),
            Value::from("temporary"),
            Value::Integer(3),
        ]];
        let encoded = encode_rows("T", &rows, &[0, 2], &mut pool).unwrap();
        assert!(pool.is_empty());

        let decoded = decode_rows("T", &encoded.rows, 2, &pool, |_| Ok(None)).unwrap();
        assert_eq!(decoded, vec![vec![Value::Integer(1), Value::Integer(3)]]);
    }

    #[test]
    fn test_stream_cells_are_written_separately() {
        let mut pool = StringPool::new(0);
        let rows = vec![vec![Value::from("icon"), Value::Stream(vec![1, 2, 3])]];
        let encoded = encode_rows("Binary", &rows, &[0, 1], &mut pool).unwrap();
        assert_eq!(encoded.streams.len(), 1);
        assert_eq!(encoded.streams[0].0, "Binary.0.2");

        let streams: HashMap<String, Vec<u8>> = encoded.streams.into_iter().collect();
        let decoded = decode_rows("Binary", &encoded.rows, 2, &pool, |name| {
            Ok(streams.get(name).cloned())
        })
        .unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let mut pool = StringPool::new(0);
        let rows = vec![vec![Value::Integer(9)]];
        let encoded = encode_rows("T", &rows, &[0], &mut pool).unwrap();
        let decoded = decode_rows("T", &encoded.rows, 3, &pool, |_| Ok(None)).unwrap();
        assert_eq!(decoded, vec![vec![Value::Integer(9), Value::Null, Value::Null]]);
    }

    #[test]
    fn test_missing_stream_payload() {
        let mut pool = StringPool::new(0);
        let rows = vec![vec![Value::Stream(vec![0])]];
        let encoded = encode_rows("T", &rows, &[0], &mut pool).unwrap();
        let result = decode_rows("T", &encoded.rows, 1, &pool, |_| Ok(None));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_stream_cell_names() {
        assert!(is_stream_cell_of("Binary", "Binary.0.2"));
        assert!(!is_stream_cell_of("Binary", "BinaryX.0.2"));
        assert!(!is_stream_cell_of("Binary", "Binary"));
        assert!(!is_stream_cell_of("Bin", "Binary.0.2"));
        assert!(!is_stream_cell_of("Binary", "Binary.a.2"));
    }
}
