use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoError, GeoPoint};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "emergency_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Pending,
    Accepted,
    Closed,
    DeletedByUser,
}

impl EmergencyStatus {
    pub fn to_str(&self) -> &str {
        match self {
            EmergencyStatus::Pending => "pending",
            EmergencyStatus::Accepted => "accepted",
            EmergencyStatus::Closed => "closed",
            EmergencyStatus::DeletedByUser => "deleted_by_user",
        }
    }

    /// Pending or accepted. A user holds at most one active emergency.
    pub fn is_active(&self) -> bool {
        matches!(self, EmergencyStatus::Pending | EmergencyStatus::Accepted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Emergency {
    pub id: Uuid,
    pub user_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    pub status: EmergencyStatus,
    pub service_provider: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Emergency {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NearbyEmergency {
    #[sqlx(flatten)]
    pub emergency: Emergency,
    pub distance_m: f64,
}

/// How a user-initiated deletion ended. A pending emergency is removed
/// outright; one already dispatched is kept as `deleted_by_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    MarkedDeletedByUser,
}
