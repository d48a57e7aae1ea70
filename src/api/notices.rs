use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::errors::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotice {
    pub title: String,
    pub content: String,
    pub pinned: bool,
}

impl ApiClient {
    pub async fn list_notices(&self) -> AppResult<Vec<Notice>> {
        let request = self.request(Method::GET, "/notices");
        self.execute(request).await
    }

    pub async fn create_notice(&self, notice: &NewNotice) -> AppResult<Notice> {
        let request = self.request(Method::POST, "/notices").json(notice);
        self.execute(request).await
    }

    pub async fn delete_notice(&self, id: i64) -> AppResult<()> {
        let request = self.request(Method::DELETE, &format!("/notices/{id}"));
        self.execute_empty(request).await
    }
}
