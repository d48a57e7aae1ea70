use serde::Serialize;

use crate::config::PublicAppConfig;
use crate::geocode::CacheStats;
use crate::map::{PinPhase, SdkState};

#[derive(Debug, Serialize)]
pub struct DashboardHealth {
    pub storage_path: String,
    pub telemetry_buffer_path: String,
    pub telemetry_queue_depth: usize,
    pub has_session: bool,
    pub geocode_cache_entries: usize,
    pub geocode_cache: CacheStats,
    pub sdk_state: SdkState,
    pub pin_phase: PinPhase,
    pub rendered_pins: usize,
    pub config: PublicAppConfig,
}
