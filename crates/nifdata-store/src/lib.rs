//! Storage layer: sharded per-NIF JSON files and the read-through lookup cache.

mod cache;
mod error;
mod fs;

pub use cache::{LookupError, RecordCache};
pub use error::StoreError;
pub use fs::{EnsuredDirs, FsStore, RecordStore, ShardedPath};
