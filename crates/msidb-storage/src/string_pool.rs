//! Shared string pool
//!
//! Every string cell in every persisted table is stored as an id into one
//! pool. Ids are stable for the life of a container: the pool only grows,
//! so rows encoded earlier in a session still decode after later interns.
//!
//! Two reserved streams hold the pool:
//! - `_StringPool`: codepage (u32 LE), then the byte length (u32 LE) of
//!   each string, in id order
//! - `_StringData`: the UTF-8 bytes of all strings, concatenated

use msidb_common::{Error, Result};
use std::collections::HashMap;

pub const STRING_POOL_STREAM: &str = "_StringPool";
pub const STRING_DATA_STREAM: &str = "_StringData";

/// Id of a pooled string; 0 is reserved for NULL
pub type StringId = u32;

#[derive(Debug, Clone, Default)]
pub struct StringPool {
    codepage: u32,
    strings: Vec<String>,
    lookup: HashMap<String, StringId>,
}

impl StringPool {
    pub fn new(codepage: u32) -> Self {
        StringPool {
            codepage,
            ..Default::default()
        }
    }

    pub fn codepage(&self) -> u32 {
        self.codepage
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Return the id for `s`, adding it if needed
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        self.strings.push(s.to_string());
        let id = self.strings.len() as StringId;
        self.lookup.insert(s.to_string(), id);
        id
    }

    /// Find the id of `s` without adding it
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }

    /// Resolve an id
    pub fn get(&self, id: StringId) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.strings.get(id as usize - 1).map(String::as_str)
    }

    /// Serialize into the contents of `_StringPool` and `_StringData`
    pub fn encode(&self) -> (Vec<u8>, Vec<u8>) {
        let mut pool = Vec::with_capacity(4 + self.strings.len() * 4);
        let mut data = Vec::new();

        pool.extend_from_slice(&self.codepage.to_le_bytes());
        for s in &self.strings {
            pool.extend_from_slice(&(s.len() as u32).to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }

        (pool, data)
    }

    /// Rebuild a pool from the contents of `_StringPool` and `_StringData`
    pub fn decode(pool: &[u8], data: &[u8]) -> Result<Self> {
        let corrupt = |message: String| Error::CorruptedStream {
            stream: STRING_POOL_STREAM.to_string(),
            message,
        };

        if pool.len() < 4 || (pool.len() - 4) % 4 != 0 {
            return Err(corrupt(format!("bad pool length {}", pool.len())));
        }

        let codepage = u32::from_le_bytes([pool[0], pool[1], pool[2], pool[3]]);
        let mut result = StringPool::new(codepage);
        let mut offset = 0usize;
        for entry in pool[4..].chunks_exact(4) {
            let len = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]) as usize;

            let end = offset + len;
            if end > data.len() {
                return Err(corrupt(format!(
                    "string {} runs past end of data ({} > {})",
                    result.len() + 1,
                    end,
                    data.len()
                )));
            }
            let s = std::str::from_utf8(&data[offset..end])
                .map_err(|e| corrupt(e.to_string()))?
                .to_string();
            offset = end;

            result.strings.push(s.clone());
            let id = result.strings.len() as StringId;
            result.lookup.entry(s).or_insert(id);
        }

        Ok(result)
    }
}
