//! msidb Storage - Compound-file container, string pool and table store
//!
//! Layering, bottom up:
//! - `container`: named byte streams with commit-on-demand
//! - `string_pool` and `codec`: how rows become stream bytes
//! - `table_storage`: loaded tables, their hold counts and physical layout

pub mod codec;
pub mod container;
pub mod string_pool;
pub mod table_storage;

pub use codec::{decode_rows, encode_rows, StoredCell};
pub use container::{Container, FileContainer, MemoryContainer};
pub use string_pool::{StringId, StringPool, STRING_DATA_STREAM, STRING_POOL_STREAM};
pub use table_storage::{TableData, TableStore};
