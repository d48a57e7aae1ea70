use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::errors::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Operating,
    Idle,
    Maintenance,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub plate_number: String,
    #[serde(default)]
    pub vehicle_type: String,
    pub status: VehicleStatus,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

impl ApiClient {
    pub async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        let request = self.request(Method::GET, "/vehicles");
        self.execute(request).await
    }
}
