use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use super::GeocodingClient;
use crate::coords::Coordinate;

static SHARED_CACHE: Lazy<Arc<GeocodeCache>> = Lazy::new(|| Arc::new(GeocodeCache::new()));

/// Exact-string address to coordinate map.
///
/// Entries live until [`GeocodeCache::clear`] or process exit; there is no
/// eviction, so this is sized for a session-scoped address universe.
#[derive(Default)]
pub struct GeocodeCache {
    entries: Mutex<HashMap<String, Coordinate>>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache every dashboard view shares.
    pub fn shared() -> Arc<GeocodeCache> {
        Arc::clone(&SHARED_CACHE)
    }

    pub fn get(&self, address: &str) -> Option<Coordinate> {
        self.entries.lock().get(address).copied()
    }

    pub fn put(&self, address: impl Into<String>, coordinate: Coordinate) {
        self.entries.lock().insert(address.into(), coordinate);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Read-through front for [`GeocodingClient`].
///
/// Two concurrent misses for the same address both reach the network; the
/// later write wins. That costs a duplicate request, never a wrong entry.
#[derive(Clone)]
pub struct CachedGeocoder {
    client: GeocodingClient,
    cache: Arc<GeocodeCache>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CachedGeocoder {
    pub fn new(client: GeocodingClient, cache: Arc<GeocodeCache>) -> Self {
        Self {
            client,
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn resolve(&self, address: &str) -> Option<Coordinate> {
        if let Some(coordinate) = self.cache.get(address) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(address, "geocode cache hit");
            return Some(coordinate);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let coordinate = self.client.resolve(address).await?;
        self.cache.put(address, coordinate);
        Some(coordinate)
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
