use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::markers::{MapMarker, MarkerLayer};
use crate::complaint::PinData;
use crate::coords::Coordinate;
use crate::geocode::BatchResolver;
use crate::telemetry::TelemetryClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinPhase {
    Idle,
    Partitioning,
    Geocoding,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PinUpdate {
    /// Input was stored; nothing renders until the map reports ready.
    MapNotReady,
    Cleared,
    Published { rendered: usize, dropped: usize },
    /// A newer update started before this one finished.
    Superseded,
}

#[derive(Debug, Default)]
pub struct PinPartition {
    pub ready: Vec<PinData>,
    pub pending: Vec<PinData>,
}

/// Splits pins into those with a usable coordinate and those needing geocoding.
pub fn partition_pins(pins: &[PinData]) -> PinPartition {
    let (ready, pending): (Vec<PinData>, Vec<PinData>) =
        pins.iter().cloned().partition(|pin| !pin.needs_geocoding());
    PinPartition { ready, pending }
}

/// Applies resolved coordinates in input order. Returns the renderable pins
/// and how many were dropped.
pub fn merge_resolved(
    input: &[PinData],
    resolved: &HashMap<String, Coordinate>,
) -> (Vec<PinData>, usize) {
    let mut pins = Vec::with_capacity(input.len());
    let mut dropped = 0;
    for pin in input {
        if !pin.needs_geocoding() {
            pins.push(pin.clone());
            continue;
        }
        match resolved.get(&pin.address) {
            Some(coordinate) => pins.push(PinData {
                coordinate: *coordinate,
                ..pin.clone()
            }),
            None => {
                warn!(
                    pin_id = %pin.id,
                    address = %pin.address,
                    "dropping pin whose address did not resolve"
                );
                dropped += 1;
            }
        }
    }
    (pins, dropped)
}

struct PinState {
    input: Vec<PinData>,
    map_ready: bool,
    phase: PinPhase,
    ready: Vec<PinData>,
    in_flight: Option<Arc<AtomicBool>>,
}

/// Owns the pin set of one map view.
///
/// Every input change re-runs partition and geocoding from scratch and
/// replaces all markers on publish. The layer is called with the state lock
/// held and must not call back into the manager.
pub struct PinManager {
    resolver: BatchResolver,
    layer: Arc<dyn MarkerLayer>,
    state: Mutex<PinState>,
    generation: AtomicU64,
    telemetry: Option<TelemetryClient>,
}

impl PinManager {
    pub fn new(resolver: BatchResolver, layer: Arc<dyn MarkerLayer>) -> Self {
        Self {
            resolver,
            layer,
            state: Mutex::new(PinState {
                input: Vec::new(),
                map_ready: false,
                phase: PinPhase::Idle,
                ready: Vec::new(),
                in_flight: None,
            }),
            generation: AtomicU64::new(0),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryClient) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn phase(&self) -> PinPhase {
        self.state.lock().phase
    }

    pub fn is_map_ready(&self) -> bool {
        self.state.lock().map_ready
    }

    pub fn ready_pins(&self) -> Vec<PinData> {
        self.state.lock().ready.clone()
    }

    pub fn resolver(&self) -> &BatchResolver {
        &self.resolver
    }

    pub async fn set_pins(&self, pins: Vec<PinData>) -> PinUpdate {
        self.state.lock().input = pins;
        self.update_pins().await
    }

    pub async fn set_map_ready(&self, ready: bool) -> PinUpdate {
        self.state.lock().map_ready = ready;
        self.update_pins().await
    }

    /// Re-runs partitioning and geocoding against the current input.
    pub async fn update_pins(&self) -> PinUpdate {
        let (generation, cancel, input) = {
            let mut state = self.state.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(previous) = state.in_flight.take() {
                previous.store(true, Ordering::SeqCst);
            }
            if !state.map_ready {
                self.layer.clear();
                state.ready.clear();
                state.phase = PinPhase::Idle;
                return PinUpdate::MapNotReady;
            }
            if state.input.is_empty() {
                self.layer.clear();
                state.ready.clear();
                state.phase = PinPhase::Idle;
                return PinUpdate::Cleared;
            }
            state.phase = PinPhase::Partitioning;
            let cancel = Arc::new(AtomicBool::new(false));
            state.in_flight = Some(Arc::clone(&cancel));
            (generation, cancel, state.input.clone())
        };

        let partition = partition_pins(&input);
        if partition.pending.is_empty() {
            debug!(pins = input.len(), "all pins carry coordinates; skipping geocoding");
            return self.publish(generation, partition.ready, 0);
        }

        let addresses: Vec<&str> = partition
            .pending
            .iter()
            .map(|pin| pin.address.as_str())
            .collect();
        let unique = addresses
            .iter()
            .filter(|address| !address.is_empty())
            .collect::<HashSet<_>>()
            .len();
        {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return PinUpdate::Superseded;
            }
            state.phase = PinPhase::Geocoding;
        }

        let resolved = self
            .resolver
            .resolve_all(addresses, Some(&cancel))
            .await;
        let cancelled = cancel.load(Ordering::SeqCst);
        self.record(
            "geocode_batch",
            json!({
                "requested": unique,
                "resolved": resolved.len(),
                "chunks": self.resolver.chunk_count(unique),
                "cancelled": cancelled,
            }),
        );
        if cancelled {
            return PinUpdate::Superseded;
        }

        let (pins, dropped) = merge_resolved(&input, &resolved);
        self.publish(generation, pins, dropped)
    }

    /// Removes rendered markers; the ready set is kept.
    pub fn clear_markers(&self) {
        let _state = self.state.lock();
        self.layer.clear();
    }

    /// Abandons in-flight work and empties the map. Call when the view goes away.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = state.in_flight.take() {
            previous.store(true, Ordering::SeqCst);
        }
        self.layer.clear();
        state.ready.clear();
        state.phase = PinPhase::Idle;
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, generation: u64, pins: Vec<PinData>, dropped: usize) -> PinUpdate {
        let rendered = {
            let mut state = self.state.lock();
            if !self.is_current(generation) {
                return PinUpdate::Superseded;
            }
            let markers: Vec<MapMarker> = pins.iter().map(MapMarker::from).collect();
            self.layer.clear();
            self.layer.install(&markers);
            state.ready = pins;
            state.phase = PinPhase::Ready;
            state.in_flight = None;
            markers.len()
        };

        debug!(rendered, dropped, "pins published");
        self.record(
            "pins_published",
            json!({ "rendered": rendered, "dropped": dropped }),
        );
        PinUpdate::Published { rendered, dropped }
    }

    fn record(&self, name: &str, payload: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            if let Err(err) = telemetry.record(name, payload) {
                warn!(?err, event = name, "failed to record pin telemetry");
            }
        }
    }
}
