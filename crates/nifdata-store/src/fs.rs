//! Byte-oriented persistent store and the sharded path scheme.
//!
//! A NIF `503709735` lives at `503/709/735.json` under the store root, so no
//! directory holds more than a thousand entries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use nifdata_core::Nif;
use tracing::debug;

use crate::StoreError;

/// Location of one NIF's cache entry, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardedPath {
    pub dir: PathBuf,
    pub file: PathBuf,
}

impl ShardedPath {
    pub fn for_nif(nif: &Nif) -> Self {
        let [first, second, rest] = nif.segments();
        let dir = Path::new(first).join(second);
        let file = dir.join(format!("{rest}.json"));
        Self { dir, file }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a whole entry. A missing entry is [`StoreError::Missing`].
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// Replace an entry. Readers see either the old bytes or the new ones.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError>;

    /// Create `dir` and its parents; succeeds if it already exists.
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError>;
}

/// [`RecordStore`] on the local filesystem, rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Sibling of `full` that no other write in this process is using.
fn staging_path(full: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let seq = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = full.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    full.with_file_name(name)
}

#[async_trait]
impl RecordStore for FsStore {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| StoreError::read(&full, e))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let full = self.root.join(path);
        let staging = staging_path(&full);
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| StoreError::io(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &full).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::io(&full, e));
        }
        Ok(())
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        let full = self.root.join(dir);
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| StoreError::io(&full, e))
    }
}

/// Directories already created during this process, so repeated writes
/// under one prefix skip `ensure_dir`. Populated lazily, never cleared.
///
/// Two concurrent first writes under the same prefix may both call
/// `ensure_dir`, which is idempotent.
#[derive(Debug, Default)]
pub struct EnsuredDirs {
    seen: Mutex<HashSet<PathBuf>>,
}

impl EnsuredDirs {
    pub async fn ensure<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        dir: &Path,
    ) -> Result<(), StoreError> {
        if self.contains(dir) {
            return Ok(());
        }
        debug!(dir = %dir.display(), "creating cache directory");
        store.ensure_dir(dir).await?;
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir.to_path_buf());
        Ok(())
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(dir)
    }
}
