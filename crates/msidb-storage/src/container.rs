//! Compound-file container
//!
//! A container is a flat namespace of named byte streams. Writes are
//! pending until `commit`, which makes the whole set durable at once.
//!
//! The on-disk format of `FileContainer` is:
//! - an 8-byte magic header
//! - a bincode-encoded map of stream name to stream bytes

use msidb_common::{Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes at the start of every container file
pub const CONTAINER_MAGIC: &[u8; 8] = b"MSIDBCF\x01";

/// Named-stream storage used by the table store
pub trait Container: Send {
    /// Read a whole stream, or `None` if it does not exist
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a stream
    fn write_stream(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Remove a stream, returning whether it existed
    fn remove_stream(&mut self, name: &str) -> Result<bool>;

    /// Names of all streams, in sorted order
    fn stream_names(&self) -> Vec<String>;

    /// Make all pending writes durable
    fn commit(&mut self) -> Result<()>;
}

pub(crate) fn codec_error(stream: &str, e: bincode::Error) -> Error {
    Error::CorruptedStream {
        stream: stream.to_string(),
        message: e.to_string(),
    }
}

/// A container that lives entirely in memory
#[derive(Debug, Default)]
pub struct MemoryContainer {
    streams: BTreeMap<String, Vec<u8>>,
    commits: usize,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `commit` has been called
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl Container for MemoryContainer {
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.streams.get(name).cloned())
    }

    fn write_stream(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.streams.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_stream(&mut self, name: &str) -> Result<bool> {
        Ok(self.streams.remove(name).is_some())
    }

    fn stream_names(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }
}

/// A container persisted as a single file
#[derive(Debug)]
pub struct FileContainer {
    path: PathBuf,
    streams: BTreeMap<String, Vec<u8>>,
    dirty: bool,
}

impl FileContainer {
    /// Start a new, empty container at `path`; nothing is written until commit
    pub fn create(path: &Path) -> Self {
        FileContainer {
            path: path.to_path_buf(),
            streams: BTreeMap::new(),
            dirty: true,
        }
    }

    /// Open an existing container file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != CONTAINER_MAGIC {
            return Err(Error::CorruptedStream {
                stream: path.display().to_string(),
                message: "not a container file".to_string(),
            });
        }

        let streams: BTreeMap<String, Vec<u8>> = bincode::deserialize_from(reader)
            .map_err(|e| codec_error(&path.display().to_string(), e))?;
        debug!(path = %path.display(), streams = streams.len(), "opened container");

        Ok(FileContainer {
            path: path.to_path_buf(),
            streams,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl Container for FileContainer {
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.streams.get(name).cloned())
    }

    fn write_stream(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.streams.insert(name.to_string(), data.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn remove_stream(&mut self, name: &str) -> Result<bool> {
        let existed = self.streams.remove(name).is_some();
        self.dirty |= existed;
        Ok(existed)
    }

    fn stream_names(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // The previous file stays in place until the rename
        let temp_path = self.temp_path();
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(CONTAINER_MAGIC)?;
            bincode::serialize_into(&mut writer, &self.streams)
                .map_err(|e| Error::Storage(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), streams = self.streams.len(), "committed container");
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_container() {
        let mut container = MemoryContainer::new();
        container.write_stream("a", b"one").unwrap();
        container.write_stream("b", b"two").unwrap();
        assert_eq!(container.read_stream("a").unwrap(), Some(b"one".to_vec()));
        assert!(container.remove_stream("a").unwrap());
        assert!(!container.remove_stream("a").unwrap());
        assert_eq!(container.stream_names(), vec!["b".to_string()]);
        container.commit().unwrap();
        assert_eq!(container.commit_count(), 1);
    }

    #[test]
    fn test_file_container_commit_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.msi");

        let mut container = FileContainer::create(&path);
        container.write_stream("_Tables", b"rows").unwrap();
        assert!(!path.is_file());
        container.commit().unwrap();
        assert!(path.is_file());

        let reopened = FileContainer::open(&path).unwrap();
        assert_eq!(
            reopened.read_stream("_Tables").unwrap(),
            Some(b"rows".to_vec())
        );
    }

    #[test]
    fn test_uncommitted_writes_are_not_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.msi");

        let mut container = FileContainer::create(&path);
        container.write_stream("kept", b"1").unwrap();
        container.commit().unwrap();
        container.write_stream("lost", b"2").unwrap();
        drop(container);

        let reopened = FileContainer::open(&path).unwrap();
        assert_eq!(reopened.stream_names(), vec!["kept".to_string()]);
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.msi");
        fs::write(&path, b"definitely not a container").unwrap();
        assert!(matches!(
            FileContainer::open(&path),
            Err(Error::CorruptedStream { .. })
        ));
    }
}
