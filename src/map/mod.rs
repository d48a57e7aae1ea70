mod loader;
mod markers;
mod pins;

pub use loader::{ScriptProbe, SdkBootstrap, SdkLoader, SdkState};
pub use markers::{MapMarker, MarkerLayer, RecordingMarkerLayer};
pub use pins::{merge_resolved, partition_pins, PinManager, PinPartition, PinPhase, PinUpdate};
