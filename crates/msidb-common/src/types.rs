//! Column type system for msidb
//!
//! Installer tables only know four kinds of cell: 16-bit and 32-bit
//! integers, pooled strings and binary streams. On disk a column's type is
//! packed into a single integer tag together with its nullable and
//! temporary flags, which is what the `_Columns` catalog table stores.

use crate::value::Value;
use crate::{Error, Result};
use std::fmt;

/// Mask for the width byte of a type tag
pub const TYPE_WIDTH_MASK: u32 = 0x00ff;
/// Set on every well-formed tag
pub const TYPE_VALID: u32 = 0x0100;
/// Binary stream column
pub const TYPE_STREAM: u32 = 0x0400;
/// String column (cells live in the string pool)
pub const TYPE_STRING: u32 = 0x0800;
/// Column accepts NULL
pub const TYPE_NULLABLE: u32 = 0x1000;
/// Column is never written to the container
pub const TYPE_TEMPORARY: u32 = 0x4000;

/// Value returned by integer accessors for a NULL cell
pub const NULL_INTEGER: i32 = i32::MIN;

/// The type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// Pooled string with a maximum length (0 means unbounded)
    String(u8),
    /// Binary stream stored outside the row
    Stream,
}

impl ColumnType {
    /// Returns true if this is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Int16 | ColumnType::Int32)
    }

    /// Returns true if this is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, ColumnType::String(_))
    }

    /// Returns true if cells of this type are stored as separate streams
    pub fn is_stream(&self) -> bool {
        matches!(self, ColumnType::Stream)
    }

    /// Value that fills this column in rows that existed before it was added
    pub fn default_value(&self) -> Value {
        Value::Null
    }

    /// Check whether a value can be stored in a column of this type
    pub fn accepts(&self, value: &Value, nullable: bool) -> bool {
        match (self, value) {
            (_, Value::Null) => nullable,
            (ColumnType::Int16, Value::Integer(i)) => i16::try_from(*i).is_ok(),
            (ColumnType::Int32, Value::Integer(i)) => *i != NULL_INTEGER,
            (ColumnType::String(0), Value::String(_)) => true,
            (ColumnType::String(max), Value::String(s)) => s.chars().count() <= *max as usize,
            (ColumnType::Stream, Value::Stream(_)) => true,
            _ => false,
        }
    }

    /// Pack this type and its flags into an on-disk tag
    pub fn to_tag(&self, nullable: bool, temporary: bool) -> u32 {
        let mut tag = TYPE_VALID
            | match self {
                ColumnType::Int16 => 2,
                ColumnType::Int32 => 4,
                ColumnType::String(max) => TYPE_STRING | *max as u32,
                ColumnType::Stream => TYPE_STREAM,
            };
        if nullable {
            tag |= TYPE_NULLABLE;
        }
        if temporary {
            tag |= TYPE_TEMPORARY;
        }
        tag
    }

    /// Unpack an on-disk tag into (type, nullable, temporary)
    pub fn from_tag(tag: u32) -> Result<(ColumnType, bool, bool)> {
        if tag & TYPE_VALID == 0 {
            return Err(Error::BadSchema(format!("invalid column type tag {:#06x}", tag)));
        }
        let width = tag & TYPE_WIDTH_MASK;
        let column_type = if tag & TYPE_STREAM != 0 {
            ColumnType::Stream
        } else if tag & TYPE_STRING != 0 {
            ColumnType::String(width as u8)
        } else {
            match width {
                2 => ColumnType::Int16,
                4 => ColumnType::Int32,
                other => {
                    return Err(Error::BadSchema(format!(
                        "unsupported integer width {} in tag {:#06x}",
                        other, tag
                    )))
                }
            }
        };
        Ok((
            column_type,
            tag & TYPE_NULLABLE != 0,
            tag & TYPE_TEMPORARY != 0,
        ))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int16 => write!(f, "SHORT"),
            ColumnType::Int32 => write!(f, "LONG"),
            ColumnType::String(0) => write!(f, "LONGCHAR"),
            ColumnType::String(max) => write!(f, "CHAR({})", max),
            ColumnType::Stream => write!(f, "OBJECT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip_keeps_flags() {
        let tag = ColumnType::String(72).to_tag(true, false);
        assert_eq!(tag & TYPE_WIDTH_MASK, 72);
        assert_eq!(
            ColumnType::from_tag(tag).unwrap(),
            (ColumnType::String(72), true, false)
        );

        let tag = ColumnType::Int16.to_tag(false, true);
        assert_eq!(
            ColumnType::from_tag(tag).unwrap(),
            (ColumnType::Int16, false, true)
        );
    }

    #[test]
    fn test_invalid_tags() {
        assert!(matches!(ColumnType::from_tag(0x0004), Err(Error::BadSchema(_))));
        assert!(matches!(
            ColumnType::from_tag(TYPE_VALID | 3),
            Err(Error::BadSchema(_))
        ));
    }

    #[test]
    fn test_accepts() {
        assert!(ColumnType::Int16.accepts(&Value::Integer(300), false));
        assert!(!ColumnType::Int16.accepts(&Value::Integer(70000), false));
        assert!(!ColumnType::Int32.accepts(&Value::Null, false));
        assert!(ColumnType::Int32.accepts(&Value::Null, true));
        assert!(!ColumnType::String(3).accepts(&Value::from("abcd"), true));
        assert!(ColumnType::String(0).accepts(&Value::from("abcd"), true));
        assert!(!ColumnType::Stream.accepts(&Value::from("abcd"), true));
    }

    #[test]
    fn test_display() {
        assert_eq!(ColumnType::Int32.to_string(), "LONG");
        assert_eq!(ColumnType::String(64).to_string(), "CHAR(64)");
        assert_eq!(ColumnType::Stream.to_string(), "OBJECT");
    }
}
