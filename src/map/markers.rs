use parking_lot::Mutex;
use serde::Serialize;

use crate::complaint::{ComplaintStatus, PinData};
use crate::coords::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub pin_id: String,
    pub complaint_id: i64,
    pub position: Coordinate,
    pub category: String,
    pub status: ComplaintStatus,
    pub is_repeat: bool,
}

impl From<&PinData> for MapMarker {
    fn from(pin: &PinData) -> Self {
        Self {
            pin_id: pin.id.clone(),
            complaint_id: pin.complaint_id,
            position: pin.coordinate,
            category: pin.category.clone(),
            status: pin.status,
            is_repeat: pin.is_repeat,
        }
    }
}

/// Rendering sink owned by the map view.
pub trait MarkerLayer: Send + Sync {
    fn clear(&self);
    fn install(&self, markers: &[MapMarker]);
}

/// Keeps the installed markers in memory; used by headless shells and tests.
#[derive(Default)]
pub struct RecordingMarkerLayer {
    markers: Mutex<Vec<MapMarker>>,
    installs: Mutex<usize>,
}

impl RecordingMarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> Vec<MapMarker> {
        self.markers.lock().clone()
    }

    pub fn install_count(&self) -> usize {
        *self.installs.lock()
    }
}

impl MarkerLayer for RecordingMarkerLayer {
    fn clear(&self) {
        self.markers.lock().clear();
    }

    fn install(&self, markers: &[MapMarker]) {
        self.markers.lock().extend_from_slice(markers);
        *self.installs.lock() += 1;
    }
}
