//! Thin client for the dashboard REST backend.
//!
//! Every request carries the stored bearer token. A 401 from any endpoint
//! ends the session: the token is cleared and callers get
//! [`AppError::Unauthorized`] pointing at the login route.

mod complaints;
mod notices;
mod statistics;
mod vehicles;

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::storage::SessionStore;
use crate::telemetry::TelemetryClient;

pub use complaints::{ComplaintQuery, StatusChange};
pub use notices::{NewNotice, Notice};
pub use statistics::{CategoryCount, DailyCount, StatisticsQuery, StatisticsSummary, StatusCount};
pub use vehicles::{Vehicle, VehicleStatus};

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    telemetry: Option<TelemetryClient>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: SessionStore) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryClient) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<()> {
        let request = self
            .request(Method::POST, "/auth/login")
            .json(&LoginRequest { username, password });
        let response: LoginResponse = self.execute(request).await?;
        self.session
            .set_token(&SecretString::from(response.access_token))?;
        debug!(username, "signed in");
        Ok(())
    }

    pub fn logout(&self) -> AppResult<()> {
        self.session.clear()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.session.token() {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret())),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(AppError::from_transport)?;
        let response = self.check(response).await?;
        let body = response.bytes().await.map_err(AppError::from_transport)?;
        decode_body(&body)
    }

    async fn execute_empty(&self, request: RequestBuilder) -> AppResult<()> {
        let response = request.send().await.map_err(AppError::from_transport)?;
        self.check(response).await?;
        Ok(())
    }

    async fn check(&self, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.expire_session());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    fn expire_session(&self) -> AppError {
        warn!("backend rejected the session token; signing out");
        if let Err(err) = self.session.clear() {
            warn!(?err, "failed to clear stored session token");
        }
        if let Some(telemetry) = &self.telemetry {
            if let Err(err) = telemetry.record("session_expired", json!({ "redirect": LOGIN_ROUTE }))
            {
                warn!(?err, "failed to record session telemetry");
            }
        }
        AppError::Unauthorized {
            redirect: LOGIN_ROUTE,
        }
    }
}

/// Bodies arrive either bare or wrapped in `{ "data": ... }`. Once a `data`
/// key is present only its value is decoded.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| AppError::Parse(err.to_string()))?;
    let payload = match value {
        Value::Object(mut object) if object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(payload).map_err(|err| AppError::Parse(err.to_string()))
}

fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
    }

    #[test]
    fn accepts_bare_and_wrapped_bodies() {
        let bare: Vec<Item> = decode_body(br#"[{"id":1}]"#).unwrap();
        let wrapped: Vec<Item> = decode_body(br#"{"data":[{"id":2}]}"#).unwrap();
        assert_eq!(bare, vec![Item { id: 1 }]);
        assert_eq!(wrapped, vec![Item { id: 2 }]);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        let err = decode_body::<Vec<Item>>(br#"{"items":[]}"#).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn malformed_wrapped_payload_is_a_parse_error() {
        let err = decode_body::<StatisticsSummary>(
            br#"{"data":{"total":"10","repeatCount":2,"byStatus":[]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));

        let summary: StatisticsSummary =
            decode_body(br#"{"data":{"total":10,"repeatCount":2}}"#).unwrap();
        assert_eq!(summary.total, 10);
        assert_eq!(summary.repeat_count, 2);
    }

    #[test]
    fn extracts_error_messages() {
        assert_eq!(error_message(r#"{"message":"민원을 찾을 수 없습니다."}"#), "민원을 찾을 수 없습니다.");
        assert_eq!(error_message(r#"{"error":"Bad Request"}"#), "Bad Request");
        assert_eq!(error_message(" gateway down "), "gateway down");
    }
}
