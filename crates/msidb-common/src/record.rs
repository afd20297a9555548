//! Records: the row tuples passed between views and their callers
//!
//! Fields are addressed from 1, matching column ordinals, so
//! `record.get(n)` is the value of the column with ordinal `n`.

use crate::types::NULL_INTEGER;
use crate::value::Value;
use crate::{Error, Result};

/// An ordered tuple of values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<Value>,
}

impl Record {
    /// Create a record with `count` NULL fields
    pub fn new(count: usize) -> Self {
        Record {
            fields: vec![Value::Null; count],
        }
    }

    /// Create a record from values in column order
    pub fn from_values(fields: Vec<Value>) -> Self {
        Record { fields }
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn check(&self, field: usize) -> Result<usize> {
        if field == 0 || field > self.fields.len() {
            return Err(Error::OutOfRange {
                index: field,
                limit: self.fields.len(),
            });
        }
        Ok(field - 1)
    }

    /// Get a field by 1-based index
    pub fn get(&self, field: usize) -> Result<&Value> {
        let idx = self.check(field)?;
        Ok(&self.fields[idx])
    }

    /// Set a field by 1-based index
    pub fn set(&mut self, field: usize, value: impl Into<Value>) -> Result<()> {
        let idx = self.check(field)?;
        self.fields[idx] = value.into();
        Ok(())
    }

    /// Set a field to NULL
    pub fn set_null(&mut self, field: usize) -> Result<()> {
        self.set(field, Value::Null)
    }

    /// Read an integer field; NULL reads as `NULL_INTEGER`
    pub fn get_integer(&self, field: usize) -> Result<i32> {
        match self.get(field)? {
            Value::Integer(i) => Ok(*i),
            Value::Null => Ok(NULL_INTEGER),
            other => Err(Error::DatatypeMismatch {
                column: field.to_string(),
                expected: "integer".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    /// Read a string field; NULL reads as `None`
    pub fn get_string(&self, field: usize) -> Result<Option<&str>> {
        match self.get(field)? {
            Value::String(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            other => Err(Error::DatatypeMismatch {
                column: field.to_string(),
                expected: "string".to_string(),
                got: other.kind_name().to_string(),
            }),
        }
    }

    /// Returns true if the field is NULL
    pub fn is_null(&self, field: usize) -> Result<bool> {
        Ok(self.get(field)?.is_null())
    }

    /// Borrow all values in column order
    pub fn values(&self) -> &[Value] {
        &self.fields
    }

    /// Take ownership of the values
    pub fn into_values(self) -> Vec<Value> {
        self.fields
    }
}

impl From<Vec<Value>> for Record {
    fn from(fields: Vec<Value>) -> Self {
        Record::from_values(fields)
    }
}
