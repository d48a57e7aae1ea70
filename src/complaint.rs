use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    Received,
    Processing,
    Completed,
    #[serde(other)]
    Unknown,
}

impl ComplaintStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ComplaintStatus::Received => "접수",
            ComplaintStatus::Processing => "처리중",
            ComplaintStatus::Completed => "처리완료",
            ComplaintStatus::Unknown => "알 수 없음",
        }
    }
}

/// Complaint record as served by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: i64,
    pub category: String,
    #[serde(default)]
    pub is_repeat: bool,
    #[serde(default)]
    pub content: String,
    pub datetime: String,
    pub status: ComplaintStatus,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Map-facing projection of a complaint. Recomputed on every input change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinData {
    pub id: String,
    pub complaint_id: i64,
    pub category: String,
    pub is_repeat: bool,
    pub content: String,
    pub datetime: String,
    pub status: ComplaintStatus,
    pub address: String,
    pub coordinate: Coordinate,
}

impl PinData {
    pub fn needs_geocoding(&self) -> bool {
        !self.coordinate.is_valid()
    }
}

impl From<&Complaint> for PinData {
    fn from(complaint: &Complaint) -> Self {
        Self {
            id: format!("pin-{}", complaint.id),
            complaint_id: complaint.id,
            category: complaint.category.clone(),
            is_repeat: complaint.is_repeat,
            content: complaint.content.clone(),
            datetime: complaint.datetime.clone(),
            status: complaint.status,
            address: complaint.address.trim().to_string(),
            coordinate: Coordinate::from_parts(complaint.latitude, complaint.longitude),
        }
    }
}

pub fn pins_from_complaints(complaints: &[Complaint]) -> Vec<PinData> {
    complaints.iter().map(PinData::from).collect()
}
