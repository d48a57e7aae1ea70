use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::GeocodeLookup;
use crate::config::AppConfig;
use crate::coords::Coordinate;
use crate::errors::{AppError, AppResult};

const ADDRESS_SEARCH_PATH: &str = "/v2/local/search/address.json";

/// Lookup facade handed to the cache layer. Every failure becomes `None`.
#[derive(Clone)]
pub struct GeocodingClient {
    inner: Arc<dyn GeocodeLookup>,
}

impl GeocodingClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let inner: Arc<dyn GeocodeLookup> = match config.kakao_rest_api_key.clone() {
            Some(key) => Arc::new(KakaoLocalClient::new(config, key)?),
            None => {
                warn!("KAKAO_REST_API_KEY is not set; pins without coordinates will not resolve");
                Arc::new(UnconfiguredLookup)
            }
        };
        Ok(Self { inner })
    }

    pub fn from_lookup(lookup: Arc<dyn GeocodeLookup>) -> Self {
        Self { inner: lookup }
    }

    pub async fn resolve(&self, address: &str) -> Option<Coordinate> {
        match self.inner.geocode(address).await {
            Ok(Some(coordinate)) if coordinate.is_valid() => Some(coordinate),
            Ok(Some(coordinate)) => {
                warn!(address, ?coordinate, "geocoder returned an unusable coordinate");
                None
            }
            Ok(None) => {
                debug!(address, "geocoder found no match");
                None
            }
            Err(err) => {
                warn!(?err, address, "geocoding request failed");
                None
            }
        }
    }
}

/// Kakao Local address search.
pub struct KakaoLocalClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl KakaoLocalClient {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.geocode_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.kakao_local_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Runs one address query. `deadline` overrides the client-wide timeout.
    pub async fn search_address(
        &self,
        query: &str,
        deadline: Option<Duration>,
    ) -> AppResult<Vec<AddressCandidate>> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, ADDRESS_SEARCH_PATH))
            .query(&[("query", query)])
            .header(
                AUTHORIZATION,
                format!("KakaoAK {}", self.api_key.expose_secret()),
            );
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }

        let response = request.send().await.map_err(AppError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await.map_err(AppError::from_transport)?;
        let parsed: AddressSearchResponse = serde_json::from_slice(&body)?;
        Ok(parsed
            .documents
            .into_iter()
            .filter_map(AddressDocument::into_candidate)
            .collect())
    }
}

#[async_trait]
impl GeocodeLookup for KakaoLocalClient {
    async fn geocode(&self, address: &str) -> AppResult<Option<Coordinate>> {
        let candidates = self.search_address(address, None).await?;
        Ok(candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.coordinate))
    }
}

/// Stand-in used when no REST key is configured.
pub struct UnconfiguredLookup;

#[async_trait]
impl GeocodeLookup for UnconfiguredLookup {
    async fn geocode(&self, _address: &str) -> AppResult<Option<Coordinate>> {
        Err(AppError::Config("KAKAO_REST_API_KEY is not configured".into()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressCandidate {
    pub address_name: String,
    pub coordinate: Coordinate,
    pub road: Option<RoadAddress>,
    pub jibun: Option<JibunAddress>,
}

impl AddressCandidate {
    /// Road name address first, then the lot-number form.
    pub fn display_label(&self) -> String {
        if let Some(road) = &self.road {
            if let Some(label) = road.structured_label() {
                return label;
            }
        }
        self.jibun
            .as_ref()
            .map(|jibun| jibun.address_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.address_name.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadAddress {
    pub address_name: String,
    pub road_name: String,
    pub main_building_no: String,
    pub sub_building_no: String,
    pub building_name: String,
    pub zone_no: String,
}

impl RoadAddress {
    fn structured_label(&self) -> Option<String> {
        if self.address_name.trim().is_empty() {
            return None;
        }
        if self.building_name.trim().is_empty() {
            Some(self.address_name.clone())
        } else {
            Some(format!("{} ({})", self.address_name, self.building_name.trim()))
        }
    }

    pub fn building_number(&self) -> String {
        if self.sub_building_no.is_empty() || self.sub_building_no == "0" {
            self.main_building_no.clone()
        } else {
            format!("{}-{}", self.main_building_no, self.sub_building_no)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JibunAddress {
    pub address_name: String,
    pub main_address_no: String,
    pub sub_address_no: String,
}

#[derive(Deserialize)]
struct AddressSearchResponse {
    #[serde(default)]
    documents: Vec<AddressDocument>,
}

#[derive(Deserialize)]
struct AddressDocument {
    #[serde(default)]
    address_name: String,
    x: Option<WireNumber>,
    y: Option<WireNumber>,
    road_address: Option<RoadAddress>,
    address: Option<JibunAddress>,
}

impl AddressDocument {
    fn into_candidate(self) -> Option<AddressCandidate> {
        let lng = self.x.and_then(|x| x.value())?;
        let lat = self.y.and_then(|y| y.value())?;
        let coordinate = Coordinate::new(lat, lng);
        if !coordinate.is_valid() {
            return None;
        }
        Some(AddressCandidate {
            address_name: self.address_name,
            coordinate,
            road: self.road_address,
            jibun: self.address,
        })
    }
}

/// Kakao sends coordinates as strings; some proxies forward them as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Number(f64),
    Text(String),
}

impl WireNumber {
    fn value(&self) -> Option<f64> {
        match self {
            WireNumber::Number(value) => Some(*value),
            WireNumber::Text(text) => text.trim().parse::<f64>().ok(),
        }
    }
}
