//! Error types for msidb

use thiserror::Error;

/// The main error type for msidb operations
#[derive(Error, Debug)]
pub enum Error {
    // View contract errors
    #[error("Operation not supported by {0} view")]
    OperationUnsupported(&'static str),

    #[error("View has not been executed")]
    NotExecuted,

    #[error("View is no longer valid: table {0} was released")]
    ViewInvalid(String),

    // Schema errors
    #[error("Bad schema: {0}")]
    BadSchema(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Datatype mismatch in column {column}: expected {expected}, got {got}")]
    DatatypeMismatch {
        column: String,
        expected: String,
        got: String,
    },

    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range (limit {limit})")]
    OutOfRange { index: usize, limit: usize },

    // Storage errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Corrupted stream {stream}: {message}")]
    CorruptedStream { stream: String, message: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    // General errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true for failures of the underlying container or I/O layer.
    ///
    /// These always propagate unchanged to the caller.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Storage(_) | Error::CorruptedStream { .. }
        )
    }
}

/// Result type alias using msidb's Error
pub type Result<T> = std::result::Result<T, Error>;
