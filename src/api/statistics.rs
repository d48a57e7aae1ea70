use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::complaint::ComplaintStatus;
use crate::errors::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ComplaintStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatisticsSummary {
    pub total: u64,
    pub repeat_count: u64,
    pub by_category: Vec<CategoryCount>,
    pub by_status: Vec<StatusCount>,
    pub daily: Vec<DailyCount>,
}

impl StatisticsSummary {
    /// Share of complaints marked completed, in `[0, 1]`.
    pub fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let completed: u64 = self
            .by_status
            .iter()
            .filter(|entry| entry.status == ComplaintStatus::Completed)
            .map(|entry| entry.count)
            .sum();
        completed as f64 / self.total as f64
    }
}

impl ApiClient {
    pub async fn statistics_summary(&self, query: &StatisticsQuery) -> AppResult<StatisticsSummary> {
        let request = self
            .request(Method::GET, "/statistics/summary")
            .query(query);
        self.execute(request).await
    }
}
