//! Fan a lookup out to all three sources at once.

use std::sync::Arc;

use nifdata_core::{CanonicalRecord, Nif, NotFound, PartialRecord, combine};
use tracing::{debug, warn};

use crate::source::SourceAdapter;

/// The three sources in merge order.
#[derive(Clone)]
pub struct SourceSet {
    racius: Arc<dyn SourceAdapter>,
    portugalio: Arc<dyn SourceAdapter>,
    europa: Arc<dyn SourceAdapter>,
}

/// Per-source results of one fan-out. Failed sources are empty.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub racius: PartialRecord,
    pub portugalio: PartialRecord,
    pub europa: PartialRecord,
}

impl Gathered {
    pub fn combine(&self) -> Result<CanonicalRecord, NotFound> {
        combine(&self.racius, &self.portugalio, &self.europa)
    }
}

impl SourceSet {
    pub fn new(
        racius: Arc<dyn SourceAdapter>,
        portugalio: Arc<dyn SourceAdapter>,
        europa: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self {
            racius,
            portugalio,
            europa,
        }
    }

    /// Query every source concurrently. A failing source is logged and
    /// contributes an empty record; this never fails.
    pub async fn gather(&self, nif: &Nif) -> Gathered {
        let (racius, portugalio, europa) = tokio::join!(
            fetch_or_empty(self.racius.as_ref(), nif),
            fetch_or_empty(self.portugalio.as_ref(), nif),
            fetch_or_empty(self.europa.as_ref(), nif),
        );
        Gathered {
            racius,
            portugalio,
            europa,
        }
    }
}

async fn fetch_or_empty(adapter: &dyn SourceAdapter, nif: &Nif) -> PartialRecord {
    let source = adapter.source();
    match adapter.fetch(nif).await {
        Ok(record) => {
            debug!(%nif, %source, ?record, "source result");
            record
        }
        Err(err) => {
            warn!(%nif, %source, error = %err, "source lookup failed, continuing without it");
            PartialRecord::default()
        }
    }
}
