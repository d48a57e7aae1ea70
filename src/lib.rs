pub mod api;
mod complaint;
mod config;
mod coords;
mod errors;
pub mod geocode;
mod health;
pub mod map;
mod storage;
mod telemetry;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::ComplaintQuery;
use crate::geocode::{
    AddressSearch, BatchResolver, CachedGeocoder, GeocodeCache, GeocodingClient,
    KakaoLocalClient, SearchError, SearchOutcome,
};
use crate::map::{MarkerLayer, PinManager, PinUpdate, ScriptProbe, SdkBootstrap, SdkLoader};

pub use api::ApiClient;
pub use complaint::{pins_from_complaints, Complaint, ComplaintStatus, PinData};
pub use config::{AppConfig, PublicAppConfig};
pub use coords::Coordinate;
pub use errors::{AppError, AppResult};
pub use health::DashboardHealth;
pub use storage::{storage_path, LocalStore, SessionStore, ACCESS_TOKEN_KEY};
pub use telemetry::{TelemetryClient, TelemetryEvent};

/// Everything one dashboard session needs, wired from configuration.
pub struct Dashboard {
    config: AppConfig,
    telemetry: TelemetryClient,
    storage: LocalStore,
    api: ApiClient,
    pins: PinManager,
    search: AddressSearch,
    sdk: SdkLoader,
}

impl Dashboard {
    pub fn initialize(
        data_dir: &Path,
        config: AppConfig,
        layer: Arc<dyn MarkerLayer>,
    ) -> AppResult<Self> {
        Self::initialize_with_cache(data_dir, config, layer, GeocodeCache::shared())
    }

    pub fn initialize_with_cache(
        data_dir: &Path,
        config: AppConfig,
        layer: Arc<dyn MarkerLayer>,
        cache: Arc<GeocodeCache>,
    ) -> AppResult<Self> {
        init_tracing();
        fs::create_dir_all(data_dir)?;

        let telemetry = TelemetryClient::new(data_dir, &config)?;
        let storage = LocalStore::open(storage_path(data_dir, &config.storage_file_name))?;
        let api = ApiClient::new(&config, SessionStore::new(storage.clone()))?
            .with_telemetry(telemetry.clone());

        let kakao = match config.kakao_rest_api_key.clone() {
            Some(key) => Some(Arc::new(KakaoLocalClient::new(&config, key)?)),
            None => None,
        };
        let client = match &kakao {
            Some(kakao) => GeocodingClient::from_lookup(kakao.clone()),
            None => GeocodingClient::new(&config)?,
        };
        let resolver = BatchResolver::with_chunk_size(
            CachedGeocoder::new(client, cache),
            config.geocode_chunk_size,
        );
        let pins = PinManager::new(resolver, layer).with_telemetry(telemetry.clone());
        let search = AddressSearch::new(kakao, &config);
        let sdk = SdkLoader::new(Arc::new(ScriptProbe::new(&config)?));

        if let Err(err) = telemetry.record(
            "app_start",
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "geocoding_configured": config.kakao_rest_api_key.is_some(),
            }),
        ) {
            warn!(?err, "failed to queue telemetry bootstrap event");
        }

        Ok(Self {
            config,
            telemetry,
            storage,
            api,
            pins,
            search,
            sdk,
        })
    }

    /// Swaps the map SDK bootstrap, for hosts that load the script themselves.
    pub fn with_sdk_bootstrap(mut self, bootstrap: Arc<dyn SdkBootstrap>) -> Self {
        self.sdk = SdkLoader::new(bootstrap);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn pins(&self) -> &PinManager {
        &self.pins
    }

    pub fn sdk(&self) -> &SdkLoader {
        &self.sdk
    }

    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }

    /// Loads the map SDK once, then lets pending pins render.
    pub async fn load_map(&self) -> AppResult<PinUpdate> {
        self.sdk.ensure_loaded().await?;
        Ok(self.pins.set_map_ready(true).await)
    }

    pub async fn refresh_complaint_pins(&self, query: &ComplaintQuery) -> AppResult<PinUpdate> {
        let complaints = self.api.list_complaints(query).await?;
        Ok(self.pins.set_pins(pins_from_complaints(&complaints)).await)
    }

    pub async fn search_address(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        self.search.search(query).await
    }

    /// Tears down the map view and flushes buffered telemetry.
    pub fn shutdown(&self) {
        self.pins.teardown();
        if let Err(err) = self.telemetry.flush() {
            warn!(?err, "failed to flush telemetry queue");
        }
    }

    pub fn health(&self) -> DashboardHealth {
        let geocoder = self.pins.resolver().geocoder();
        DashboardHealth {
            storage_path: self.storage.path().to_string_lossy().to_string(),
            telemetry_buffer_path: self.telemetry.buffer_path().to_string_lossy().to_string(),
            telemetry_queue_depth: self.telemetry.queue_depth(),
            has_session: self.api.session().has_token(),
            geocode_cache_entries: geocoder.cache().len(),
            geocode_cache: geocoder.stats(),
            sdk_state: self.sdk.state(),
            pin_phase: self.pins.phase(),
            rendered_pins: self.pins.ready_pins().len(),
            config: self.config.public_profile(),
        }
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,complaint_dashboard=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
