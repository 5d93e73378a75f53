//! Read-through cache in front of the three-source merge.
//!
//! A hit returns the stored record without touching any source. A miss fans
//! out to every source, merges, persists, and returns. Entries never expire.
//! Not-found results are not stored, so a later lookup asks the sources again.

use nifdata_core::{CanonicalRecord, Nif};
use nifdata_sources::SourceSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fs::{EnsuredDirs, RecordStore, ShardedPath};
use crate::StoreError;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("NIF {0} not found in any source")]
    NotFound(Nif),

    #[error("could not serialise record for {nif}: {source}")]
    Serialize {
        nif: Nif,
        #[source]
        source: serde_json::Error,
    },
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub struct RecordCache<S> {
    store: S,
    sources: SourceSet,
    dirs: EnsuredDirs,
}

impl<S: RecordStore> RecordCache<S> {
    pub fn new(store: S, sources: SourceSet) -> Self {
        Self {
            store,
            sources,
            dirs: EnsuredDirs::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up the canonical record for `nif`.
    ///
    /// `nif` is expected to have passed [`Nif::checked`] already; the cache
    /// itself only relies on its shape.
    pub async fn get(&self, nif: &Nif) -> Result<CanonicalRecord, LookupError> {
        self.lookup(nif).await.map(|(record, _)| record)
    }

    /// Like [`get`](Self::get), but returns the serialised record. On a hit
    /// these are the stored bytes, unchanged.
    pub async fn get_bytes(&self, nif: &Nif) -> Result<Vec<u8>, LookupError> {
        self.lookup(nif).await.map(|(_, bytes)| bytes)
    }

    async fn lookup(&self, nif: &Nif) -> Result<(CanonicalRecord, Vec<u8>), LookupError> {
        let path = ShardedPath::for_nif(nif);
        if let Some(hit) = self.read_cached(nif, &path).await {
            return Ok(hit);
        }

        info!(%nif, "cache miss, querying sources");
        let record = self.sources.gather(nif).await.combine().map_err(|_| {
            info!(%nif, "no source returned a name");
            LookupError::NotFound(nif.clone())
        })?;
        let bytes = serde_json::to_vec(&record).map_err(|source| LookupError::Serialize {
            nif: nif.clone(),
            source,
        })?;

        match self.persist(&path, &bytes).await {
            Ok(()) => info!(%nif, name = %record.name, "cached new record"),
            Err(err) => warn!(
                %nif,
                error = %err,
                "failed to cache record, next lookup will query sources again"
            ),
        }
        Ok((record, bytes))
    }

    /// Any read or decode failure is a miss, as is an entry without a name.
    async fn read_cached(
        &self,
        nif: &Nif,
        path: &ShardedPath,
    ) -> Option<(CanonicalRecord, Vec<u8>)> {
        let bytes = match self.store.read(&path.file).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_missing() => return None,
            Err(err) => {
                warn!(%nif, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice::<CanonicalRecord>(&bytes) {
            Ok(record) if record.name.is_empty() => {
                warn!(%nif, "cache entry has an empty name, treating as miss");
                None
            }
            Ok(record) => {
                debug!(%nif, "cache hit");
                Some((record, bytes))
            }
            Err(err) => {
                warn!(%nif, error = %err, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    async fn persist(&self, path: &ShardedPath, bytes: &[u8]) -> Result<(), StoreError> {
        self.dirs.ensure(&self.store, &path.dir).await?;
        self.store.write(&path.file, bytes).await
    }
}
