//! Address to coordinate resolution for complaint pins.
//!
//! Layers, leaves first: [`GeocodingClient`] makes one lookup per call and
//! never fails, [`CachedGeocoder`] puts the process-wide [`GeocodeCache`] in
//! front of it, and [`BatchResolver`] fans a set of addresses out in bounded
//! chunks. [`AddressSearch`] is the interactive variant that reports failures
//! to the operator instead of absorbing them.

mod batch;
mod cache;
mod client;
mod search;

use async_trait::async_trait;

use crate::coords::Coordinate;
use crate::errors::AppResult;

pub use batch::BatchResolver;
pub use cache::{CacheStats, CachedGeocoder, GeocodeCache};
pub use client::{
    AddressCandidate, GeocodingClient, JibunAddress, KakaoLocalClient, RoadAddress,
    UnconfiguredLookup,
};
pub use search::{AddressSearch, SearchError, SearchOutcome};

/// One upstream address lookup. `Ok(None)` means the service found nothing.
#[async_trait]
pub trait GeocodeLookup: Send + Sync {
    async fn geocode(&self, address: &str) -> AppResult<Option<Coordinate>>;
}
