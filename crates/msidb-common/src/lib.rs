//! msidb Common - Core types and utilities shared across all crates
//!
//! This crate provides the foundational types used throughout msidb:
//! - `ColumnType`: the four installer cell types and their on-disk tags
//! - `Value` and `Record`: cells and row tuples
//! - `ColumnDescriptor`: a column's table, name, ordinal and flags
//! - `Error`: Unified error types

pub mod column;
pub mod error;
pub mod record;
pub mod types;
pub mod value;

pub use column::{ColumnDescriptor, ColumnInfo, Ordinal};
pub use error::{Error, Result};
pub use record::Record;
pub use types::{ColumnType, NULL_INTEGER};
pub use value::Value;
