//! Database configuration

use msidb_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a database file is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Reads only; `commit` is refused
    ReadOnly,
    /// Open an existing database for changes
    #[default]
    Transact,
    /// Start a new, empty database, replacing any existing file on commit
    Create,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Open mode.
    pub mode: OpenMode,
    /// Codepage recorded in the string pool of new databases.
    pub codepage: u32,
    /// Commit pending changes when the database is dropped.
    pub commit_on_drop: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mode: OpenMode::Transact,
            codepage: 0,
            commit_on_drop: false,
        }
    }
}

impl DatabaseConfig {
    pub fn read_only() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            ..Default::default()
        }
    }

    pub fn create() -> Self {
        Self {
            mode: OpenMode::Create,
            ..Default::default()
        }
    }

    pub fn with_commit_on_drop(mut self, commit_on_drop: bool) -> Self {
        self.commit_on_drop = commit_on_drop;
        self
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }
}
