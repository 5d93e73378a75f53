//! The contract every upstream source implements.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nifdata_core::{Nif, PartialRecord, Source};
use thiserror::Error;

use crate::lane::{LaneAborted, RateLimitedLane};

/// A source could not produce a partial record.
///
/// `Clone` so that one outcome can be handed to every caller coalesced onto
/// the same lane call; non-`Clone` inner errors are held behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(Arc<reqwest::Error>),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[cfg(feature = "http")]
    #[error("JSON parse error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error(transparent)]
    Aborted(#[from] LaneAborted),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

#[cfg(feature = "http")]
impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

/// One upstream lookup source.
///
/// Implementations return whatever fields the source provided, or fail.
/// They never retry.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError>;
}

/// Routes an adapter's fetches through its own [`RateLimitedLane`].
pub struct Throttled {
    source: Source,
    lane: RateLimitedLane<Nif, PartialRecord, SourceError>,
}

impl Throttled {
    pub fn new<A: SourceAdapter + 'static>(inner: A, cool_down: Duration) -> Self {
        let source = inner.source();
        let inner = Arc::new(inner);
        let lane = RateLimitedLane::new(cool_down, move |nif: Nif| {
            let inner = Arc::clone(&inner);
            async move { inner.fetch(&nif).await }
        });
        Self { source, lane }
    }
}

#[async_trait]
impl SourceAdapter for Throttled {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError> {
        self.lane.call(nif.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl SourceAdapter for Counting {
        fn source(&self) -> Source {
            Source::Portugalio
        }

        async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(PartialRecord {
                name: Some(format!("company {nif}")),
                ..PartialRecord::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_adapter_coalesces_same_nif() {
        let calls = Arc::new(AtomicUsize::new(0));
        let throttled = Throttled::new(Counting(Arc::clone(&calls)), Duration::from_secs(60));
        assert_eq!(throttled.source(), Source::Portugalio);

        let nif = Nif::parse("123456789").unwrap();
        let (a, b) = tokio::join!(throttled.fetch(&nif), throttled.fetch(&nif));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn aborted_lane_maps_to_source_error() {
        let err: SourceError = LaneAborted.into();
        assert!(matches!(err, SourceError::Aborted(_)));
    }
}
