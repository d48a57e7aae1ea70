use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{AddressCandidate, KakaoLocalClient};
use crate::config::AppConfig;
use crate::errors::AppError;

/// Result of an operator-driven address search. An empty result is not a failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "candidates", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found(Vec<AddressCandidate>),
    NoResults,
}

impl SearchOutcome {
    pub fn candidates(&self) -> &[AddressCandidate] {
        match self {
            SearchOutcome::Found(candidates) => candidates,
            SearchOutcome::NoResults => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("empty search query")]
    EmptyQuery,
    #[error("address search timed out")]
    Timeout,
    #[error("address search could not reach the server")]
    Network,
    #[error("address search failed with status {0}")]
    Status(u16),
}

impl SearchError {
    /// Copy shown inline under the search box.
    pub fn user_message(&self) -> &'static str {
        match self {
            SearchError::EmptyQuery => "검색어를 입력해주세요.",
            SearchError::Timeout => "검색 시간이 초과되었습니다. 다시 시도해주세요.",
            SearchError::Network => "네트워크 오류가 발생했습니다. 연결 상태를 확인해주세요.",
            SearchError::Status(400) => "잘못된 요청입니다. 검색어를 확인해주세요.",
            SearchError::Status(401) => "인증에 실패했습니다. API 키를 확인해주세요.",
            SearchError::Status(403) => "주소 검색 권한이 없습니다.",
            SearchError::Status(429) => "요청이 너무 많습니다. 잠시 후 다시 시도해주세요.",
            SearchError::Status(status) if *status >= 500 => {
                "서버 오류가 발생했습니다. 잠시 후 다시 시도해주세요."
            }
            SearchError::Status(_) => "주소 검색에 실패했습니다.",
        }
    }

    /// Whether the retry affordance should be offered.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout | SearchError::Network => true,
            SearchError::Status(status) => *status == 429 || *status >= 500,
            SearchError::EmptyQuery => false,
        }
    }

    fn from_app_error(err: AppError) -> Self {
        match err {
            AppError::Timeout => SearchError::Timeout,
            AppError::Status { status, .. } => SearchError::Status(status),
            AppError::Http(err) => match err.status() {
                Some(status) => SearchError::Status(status.as_u16()),
                None => SearchError::Network,
            },
            _ => SearchError::Network,
        }
    }
}

/// Interactive address lookup with a hard per-request deadline.
#[derive(Clone)]
pub struct AddressSearch {
    client: Option<Arc<KakaoLocalClient>>,
    deadline: Duration,
}

impl AddressSearch {
    pub fn new(client: Option<Arc<KakaoLocalClient>>, config: &AppConfig) -> Self {
        Self {
            client,
            deadline: Duration::from_millis(config.address_search_timeout_ms),
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let Some(client) = &self.client else {
            warn!("address search requested without KAKAO_REST_API_KEY");
            return Err(SearchError::Status(401));
        };

        match client.search_address(query, Some(self.deadline)).await {
            Ok(candidates) if candidates.is_empty() => {
                debug!(query, "address search returned no candidates");
                Ok(SearchOutcome::NoResults)
            }
            Ok(candidates) => Ok(SearchOutcome::Found(candidates)),
            Err(err) => {
                warn!(?err, query, "address search failed");
                Err(SearchError::from_app_error(err))
            }
        }
    }
}
