use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    geo::GeoJsonPoint,
    models::emergencymodel::{DeleteOutcome, Emergency, EmergencyStatus},
    service::emergency_service::{EmergencyMap, EmergencyView},
};

use super::{providerdtos::FilterProviderDto, userdtos::UserContactDto};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreateEmergencyDto {
    #[serde(deserialize_with = "super::coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "super::coordinate")]
    pub latitude: f64,
}

#[derive(Debug, Serialize)]
pub struct EmergencyDto {
    pub id: String,
    pub user_id: String,
    pub status: EmergencyStatus,
    pub point: GeoJsonPoint,
    pub service_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserContactDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<FilterProviderDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl EmergencyDto {
    pub fn filter_emergency(emergency: &Emergency) -> Self {
        EmergencyDto {
            id: emergency.id.to_string(),
            user_id: emergency.user_id.to_string(),
            status: emergency.status,
            point: GeoJsonPoint::new(emergency.longitude, emergency.latitude),
            service_provider: emergency.service_provider.map(|id| id.to_string()),
            user: None,
            provider: None,
            distance_m: None,
            created_at: emergency.created_at,
            updated_at: emergency.updated_at,
        }
    }

    pub fn from_view(view: &EmergencyView) -> Self {
        EmergencyDto {
            user: view.user.as_ref().map(UserContactDto::from_user),
            provider: view.provider.as_ref().map(FilterProviderDto::filter_provider),
            distance_m: view.distance_m,
            ..EmergencyDto::filter_emergency(&view.emergency)
        }
    }

    pub fn from_views(views: &[EmergencyView]) -> Vec<EmergencyDto> {
        views.iter().map(EmergencyDto::from_view).collect()
    }
}

#[derive(Debug, Serialize)]
pub struct EmergencyResponseDto {
    pub status: String,
    pub emergency: EmergencyDto,
}

#[derive(Debug, Serialize)]
pub struct EmergencyListResponseDto {
    pub status: String,
    pub emergencies: Vec<EmergencyDto>,
    pub results: usize,
}

impl EmergencyListResponseDto {
    pub fn from_views(views: &[EmergencyView]) -> Self {
        EmergencyListResponseDto {
            status: "success".to_string(),
            emergencies: EmergencyDto::from_views(views),
            results: views.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmergencyMapDto {
    pub status: String,
    pub provider: FilterProviderDto,
    pub pending: Vec<EmergencyDto>,
    pub accepted: Vec<EmergencyDto>,
}

impl From<&EmergencyMap> for EmergencyMapDto {
    fn from(map: &EmergencyMap) -> Self {
        EmergencyMapDto {
            status: "success".to_string(),
            provider: FilterProviderDto::filter_provider(&map.provider),
            pending: EmergencyDto::from_views(&map.pending),
            accepted: EmergencyDto::from_views(&map.accepted),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteEmergencyResponseDto {
    pub status: String,
    pub outcome: DeleteOutcome,
    pub message: String,
}

impl From<DeleteOutcome> for DeleteEmergencyResponseDto {
    fn from(outcome: DeleteOutcome) -> Self {
        let message = match outcome {
            DeleteOutcome::Removed => "Emergency request deleted",
            DeleteOutcome::MarkedDeletedByUser => {
                "Emergency request withdrawn, the assigned hospital has been informed"
            }
        };
        DeleteEmergencyResponseDto {
            status: "success".to_string(),
            outcome,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_renders_status_and_geojson() {
        let emergency = Emergency {
            id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            longitude: 77.5946,
            latitude: 12.9716,
            status: EmergencyStatus::DeletedByUser,
            service_provider: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(EmergencyDto::filter_emergency(&emergency)).unwrap();
        assert_eq!(json["status"], "deleted_by_user");
        assert_eq!(json["point"]["coordinates"][1], 12.9716);
        assert!(json.get("distance_m").is_none());
    }

    #[test]
    fn delete_outcome_is_snake_case() {
        let json = serde_json::to_value(DeleteEmergencyResponseDto::from(
            DeleteOutcome::MarkedDeletedByUser,
        ))
        .unwrap();
        assert_eq!(json["outcome"], "marked_deleted_by_user");
    }
}
