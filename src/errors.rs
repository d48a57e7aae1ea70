use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
    #[error("malformed upstream response: {0}")]
    Parse(String),
    #[error("request timed out")]
    Timeout,
    #[error("upstream responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("session expired; sign in again at {redirect}")]
    Unauthorized { redirect: &'static str },
    #[error("map sdk failed to load: {0}")]
    SdkLoad(String),
}

impl AppError {
    /// Folds transport timeouts into `Timeout` so callers can match on one variant.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout
        } else {
            AppError::Http(err)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Status { status, .. } => Some(*status),
            AppError::Unauthorized { .. } => Some(401),
            AppError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}
