//! Upstream lookup sources: the adapter contract, the rate-limited coalescing
//! lane, the three-way fan-out, and (feature `http`) the concrete scrapers.

pub mod lane;
pub mod set;
pub mod source;

#[cfg(feature = "http")]
mod europa;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
mod jsonld;
#[cfg(feature = "http")]
mod portugalio;
#[cfg(feature = "http")]
mod racius;

pub use lane::{LaneAborted, RateLimitedLane};
pub use set::{Gathered, SourceSet};
pub use source::{SourceAdapter, SourceError, Throttled};

#[cfg(feature = "http")]
pub use europa::EuropaAdapter;
#[cfg(feature = "http")]
pub use http::{HttpConfig, build_sources};
#[cfg(feature = "http")]
pub use portugalio::PortugalioAdapter;
#[cfg(feature = "http")]
pub use racius::RaciusAdapter;
