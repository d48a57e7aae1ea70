use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SdkState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

/// The one-time work that makes the map SDK usable.
#[async_trait]
pub trait SdkBootstrap: Send + Sync {
    async fn load(&self) -> AppResult<()>;
}

/// Process-wide map SDK initialisation: `Unloaded -> Loading -> Ready | Failed`.
///
/// Concurrent callers share one load. A failed load can be retried.
pub struct SdkLoader {
    bootstrap: Arc<dyn SdkBootstrap>,
    state: watch::Sender<SdkState>,
}

impl SdkLoader {
    pub fn new(bootstrap: Arc<dyn SdkBootstrap>) -> Self {
        let (state, _) = watch::channel(SdkState::Unloaded);
        Self { bootstrap, state }
    }

    pub fn state(&self) -> SdkState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SdkState> {
        self.state.subscribe()
    }

    pub async fn ensure_loaded(&self) -> AppResult<()> {
        let mut claimed = false;
        self.state.send_if_modified(|state| match state {
            SdkState::Unloaded | SdkState::Failed(_) => {
                *state = SdkState::Loading;
                claimed = true;
                true
            }
            SdkState::Loading | SdkState::Ready => false,
        });
        if !claimed {
            return self.wait_until_settled().await;
        }

        info!("loading map sdk");
        let mut guard = LoadingGuard {
            state: &self.state,
            armed: true,
        };
        let result = self.bootstrap.load().await;
        guard.armed = false;

        match result {
            Ok(()) => {
                self.state.send_replace(SdkState::Ready);
                info!("map sdk ready");
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(?err, "map sdk failed to load");
                self.state.send_replace(SdkState::Failed(reason.clone()));
                Err(AppError::SdkLoad(reason))
            }
        }
    }

    async fn wait_until_settled(&self) -> AppResult<()> {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|state| !matches!(state, SdkState::Loading))
            .await
            .map_err(|_| AppError::SdkLoad("sdk loader closed".into()))?;
        match &*settled {
            SdkState::Ready => Ok(()),
            SdkState::Failed(reason) => Err(AppError::SdkLoad(reason.clone())),
            SdkState::Unloaded | SdkState::Loading => {
                Err(AppError::SdkLoad("sdk load was abandoned".into()))
            }
        }
    }
}

// Puts the state back to Unloaded if the loading future is dropped mid-flight.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SdkState>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(SdkState::Unloaded);
        }
    }
}

/// Confirms the Kakao map script is reachable with the configured app key.
pub struct ScriptProbe {
    http: reqwest::Client,
    sdk_url: String,
    app_key: Option<SecretString>,
}

impl ScriptProbe {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            sdk_url: config.kakao_map_sdk_url.clone(),
            app_key: config.kakao_map_app_key.clone(),
        })
    }
}

#[async_trait]
impl SdkBootstrap for ScriptProbe {
    async fn load(&self) -> AppResult<()> {
        let Some(app_key) = &self.app_key else {
            return Err(AppError::Config("KAKAO_MAP_APP_KEY is not configured".into()));
        };
        let response = self
            .http
            .get(&self.sdk_url)
            .query(&[
                ("appkey", app_key.expose_secret()),
                ("autoload", "false"),
                ("libraries", "services"),
            ])
            .send()
            .await
            .map_err(AppError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status {
                status: status.as_u16(),
                message: "map sdk script request rejected".into(),
            });
        }
        Ok(())
    }
}
