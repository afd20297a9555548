//! Runtime value representation for msidb
//!
//! The `Value` enum is what a single table cell holds in memory. Strings are
//! kept decoded here; the string pool only comes into play when rows are
//! written to or read from the container.

use std::fmt;

/// Runtime value of a single cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Integer cell (16-bit columns are range-checked on write)
    Integer(i32),
    /// String cell
    String(String),
    /// Binary stream cell
    Stream(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to read this value as an integer
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to read this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to read this value as stream bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Stream(b) => Some(b),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
            Value::Stream(_) => "stream",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
            Value::Stream(b) => write!(f, "<stream {} bytes>", b.len()),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i16> for Value {
    fn from(i: i16) -> Self {
        Value::Integer(i as i32)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Stream(b)
    }
}
