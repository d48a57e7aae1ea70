use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::complaint::{Complaint, ComplaintStatus};
use crate::errors::AppResult;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ComplaintStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub status: ComplaintStatus,
}

// List endpoints are paged on some deployments.
#[derive(Deserialize)]
#[serde(untagged)]
enum ComplaintList {
    Page { content: Vec<Complaint> },
    Items(Vec<Complaint>),
}

impl ApiClient {
    pub async fn list_complaints(&self, query: &ComplaintQuery) -> AppResult<Vec<Complaint>> {
        let request = self.request(Method::GET, "/complaints").query(query);
        let list: ComplaintList = self.execute(request).await?;
        Ok(match list {
            ComplaintList::Page { content } => content,
            ComplaintList::Items(items) => items,
        })
    }

    pub async fn get_complaint(&self, id: i64) -> AppResult<Complaint> {
        let request = self.request(Method::GET, &format!("/complaints/{id}"));
        self.execute(request).await
    }

    pub async fn update_complaint_status(
        &self,
        id: i64,
        status: ComplaintStatus,
    ) -> AppResult<Complaint> {
        let request = self
            .request(Method::PATCH, &format!("/complaints/{id}/status"))
            .json(&StatusChange { status });
        self.execute(request).await
    }
}
