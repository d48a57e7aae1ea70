use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tracing::{debug, info};

use super::CachedGeocoder;
use crate::coords::Coordinate;

pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Resolves address sets in sequential chunks of concurrent lookups.
///
/// At most `chunk_size` lookups are in flight; chunk N+1 starts only after
/// every lookup of chunk N has settled. Failed addresses are simply absent
/// from the result.
#[derive(Clone)]
pub struct BatchResolver {
    geocoder: CachedGeocoder,
    chunk_size: usize,
}

impl BatchResolver {
    pub fn new(geocoder: CachedGeocoder) -> Self {
        Self::with_chunk_size(geocoder, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(geocoder: CachedGeocoder, chunk_size: usize) -> Self {
        Self {
            geocoder,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self, unique_addresses: usize) -> usize {
        unique_addresses.div_ceil(self.chunk_size)
    }

    pub fn geocoder(&self) -> &CachedGeocoder {
        &self.geocoder
    }

    /// `cancel` is checked before each chunk; a cancelled run returns what
    /// earlier chunks resolved.
    pub async fn resolve_all<I, S>(
        &self,
        addresses: I,
        cancel: Option<&AtomicBool>,
    ) -> HashMap<String, Coordinate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique = dedup_addresses(addresses);
        let mut resolved = HashMap::with_capacity(unique.len());
        if unique.is_empty() {
            return resolved;
        }

        let chunks = self.chunk_count(unique.len());
        debug!(
            addresses = unique.len(),
            chunks,
            chunk_size = self.chunk_size,
            "resolving address batch"
        );

        for (index, chunk) in unique.chunks(self.chunk_size).enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                info!(
                    completed_chunks = index,
                    chunks, "address batch cancelled before completion"
                );
                break;
            }

            let lookups = chunk.iter().map(|address| self.geocoder.resolve(address));
            let results = join_all(lookups).await;
            for (address, coordinate) in chunk.iter().zip(results) {
                if let Some(coordinate) = coordinate {
                    resolved.insert(address.clone(), coordinate);
                }
            }
        }

        resolved
    }
}

/// Structural dedup in first-seen order; empty strings are skipped.
fn dedup_addresses<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter_map(|address| {
            let address = address.as_ref();
            if address.is_empty() || !seen.insert(address.to_string()) {
                None
            } else {
                Some(address.to_string())
            }
        })
        .collect()
}
