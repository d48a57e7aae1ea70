use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_KAKAO_LOCAL_BASE_URL: &str = "https://dapi.kakao.com";
const DEFAULT_KAKAO_MAP_SDK_URL: &str = "https://dapi.kakao.com/v2/maps/sdk.js";
const DEFAULT_GEOCODE_CHUNK_SIZE: usize = 5;
const DEFAULT_TELEMETRY_BUFFER_MAX_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub kakao_rest_api_key: Option<SecretString>,
    pub kakao_map_app_key: Option<SecretString>,
    pub kakao_local_base_url: String,
    pub kakao_map_sdk_url: String,
    pub geocode_chunk_size: usize,
    pub geocode_timeout_ms: u64,
    pub address_search_timeout_ms: u64,
    pub storage_file_name: String,
    pub telemetry_enabled_by_default: bool,
    pub telemetry_batch_size: usize,
    pub telemetry_buffer_max_bytes: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub api_base_url: String,
    pub api_timeout_ms: u64,
    pub kakao_local_base_url: String,
    pub kakao_map_sdk_url: String,
    pub geocode_chunk_size: usize,
    pub geocode_timeout_ms: u64,
    pub address_search_timeout_ms: u64,
    pub storage_file_name: String,
    pub telemetry_enabled_by_default: bool,
    pub telemetry_batch_size: usize,
    pub telemetry_buffer_max_bytes: u64,
    pub has_kakao_rest_api_key: bool,
    pub has_kakao_map_app_key: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_ms: 15_000,
            kakao_rest_api_key: None,
            kakao_map_app_key: None,
            kakao_local_base_url: DEFAULT_KAKAO_LOCAL_BASE_URL.to_string(),
            kakao_map_sdk_url: DEFAULT_KAKAO_MAP_SDK_URL.to_string(),
            geocode_chunk_size: DEFAULT_GEOCODE_CHUNK_SIZE,
            geocode_timeout_ms: 10_000,
            address_search_timeout_ms: 3_000,
            storage_file_name: "dashboard-storage.json".to_string(),
            telemetry_enabled_by_default: true,
            telemetry_batch_size: 25,
            telemetry_buffer_max_bytes: DEFAULT_TELEMETRY_BUFFER_MAX_BYTES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        Self {
            api_base_url: parse_string("API_BASE_URL", defaults.api_base_url),
            api_timeout_ms: parse_u64("API_TIMEOUT_MS", defaults.api_timeout_ms),
            kakao_rest_api_key: parse_secret("KAKAO_REST_API_KEY"),
            kakao_map_app_key: parse_secret("KAKAO_MAP_APP_KEY"),
            kakao_local_base_url: parse_string(
                "KAKAO_LOCAL_BASE_URL",
                defaults.kakao_local_base_url,
            ),
            kakao_map_sdk_url: parse_string("KAKAO_MAP_SDK_URL", defaults.kakao_map_sdk_url),
            geocode_chunk_size: parse_usize("GEOCODE_CHUNK_SIZE", defaults.geocode_chunk_size)
                .max(1),
            geocode_timeout_ms: parse_u64("GEOCODE_TIMEOUT_MS", defaults.geocode_timeout_ms),
            address_search_timeout_ms: parse_u64(
                "ADDRESS_SEARCH_TIMEOUT_MS",
                defaults.address_search_timeout_ms,
            ),
            storage_file_name: parse_string("STORAGE_FILE_NAME", defaults.storage_file_name),
            telemetry_enabled_by_default: parse_bool(
                "TELEMETRY_ENABLED",
                defaults.telemetry_enabled_by_default,
            ),
            telemetry_batch_size: parse_usize("TELEMETRY_BATCH_SIZE", defaults.telemetry_batch_size)
                .max(1),
            telemetry_buffer_max_bytes: parse_u64(
                "TELEMETRY_BUFFER_MAX_BYTES",
                defaults.telemetry_buffer_max_bytes,
            ),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            api_base_url: self.api_base_url.clone(),
            api_timeout_ms: self.api_timeout_ms,
            kakao_local_base_url: self.kakao_local_base_url.clone(),
            kakao_map_sdk_url: self.kakao_map_sdk_url.clone(),
            geocode_chunk_size: self.geocode_chunk_size,
            geocode_timeout_ms: self.geocode_timeout_ms,
            address_search_timeout_ms: self.address_search_timeout_ms,
            storage_file_name: self.storage_file_name.clone(),
            telemetry_enabled_by_default: self.telemetry_enabled_by_default,
            telemetry_batch_size: self.telemetry_batch_size,
            telemetry_buffer_max_bytes: self.telemetry_buffer_max_bytes,
            has_kakao_rest_api_key: self.kakao_rest_api_key.is_some(),
            has_kakao_map_app_key: self.kakao_map_app_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
