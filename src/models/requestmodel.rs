use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoError, GeoPoint};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "request_title")]
pub enum RequestTitle {
    Towing,
    #[serde(rename = "Flat-Tyre")]
    #[sqlx(rename = "Flat-Tyre")]
    FlatTyre,
    #[serde(rename = "Battery-Jumpstart")]
    #[sqlx(rename = "Battery-Jumpstart")]
    BatteryJumpstart,
    #[serde(rename = "Starting Problem")]
    #[sqlx(rename = "Starting Problem")]
    StartingProblem,
    #[serde(rename = "Key-Unlock-Assistance")]
    #[sqlx(rename = "Key-Unlock-Assistance")]
    KeyUnlockAssistance,
    #[serde(rename = "Fuel-Delivery")]
    #[sqlx(rename = "Fuel-Delivery")]
    FuelDelivery,
    Other,
}

impl RequestTitle {
    pub const ALL: [RequestTitle; 7] = [
        RequestTitle::Towing,
        RequestTitle::FlatTyre,
        RequestTitle::BatteryJumpstart,
        RequestTitle::StartingProblem,
        RequestTitle::KeyUnlockAssistance,
        RequestTitle::FuelDelivery,
        RequestTitle::Other,
    ];

    pub fn to_str(&self) -> &str {
        match self {
            RequestTitle::Towing => "Towing",
            RequestTitle::FlatTyre => "Flat-Tyre",
            RequestTitle::BatteryJumpstart => "Battery-Jumpstart",
            RequestTitle::StartingProblem => "Starting Problem",
            RequestTitle::KeyUnlockAssistance => "Key-Unlock-Assistance",
            RequestTitle::FuelDelivery => "Fuel-Delivery",
            RequestTitle::Other => "Other",
        }
    }
}

impl FromStr for RequestTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestTitle::ALL
            .into_iter()
            .find(|title| title.to_str() == s)
            .ok_or_else(|| format!("Invalid title provided: {}", s))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bike,
    Car,
}

impl VehicleType {
    pub fn to_str(&self) -> &str {
        match self {
            VehicleType::Bike => "bike",
            VehicleType::Car => "car",
        }
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bike" => Ok(VehicleType::Bike),
            "car" => Ok(VehicleType::Car),
            _ => Err("Invalid vehicle type. Must be 'bike' or 'car'".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VehicleInfo {
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub number: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Closed,
}

impl RequestStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    pub title: RequestTitle,
    pub describe_problem: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vehicle_name: String,
    pub status: RequestStatus,
    /// Every available mechanic within range when the request was created.
    pub candidate_providers: Vec<Uuid>,
    pub selected_provider: Option<Uuid>,
    pub advance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }

    pub fn vehicle_info(&self) -> VehicleInfo {
        VehicleInfo {
            vehicle_type: self.vehicle_type,
            number: self.vehicle_number.clone(),
            name: self.vehicle_name.clone(),
        }
    }

    pub fn is_candidate(&self, provider_id: Uuid) -> bool {
        self.candidate_providers.contains(&provider_id)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NearbyServiceRequest {
    #[sqlx(flatten)]
    pub request: ServiceRequest,
    pub distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub user_id: Uuid,
    pub point: GeoPoint,
    pub title: RequestTitle,
    pub describe_problem: String,
    pub vehicle_info: VehicleInfo,
    pub candidate_providers: Vec<Uuid>,
    pub advance: f64,
}

/// Edits a user may make while the request is still pending.
#[derive(Debug, Clone, Default)]
pub struct ServiceRequestUpdate {
    pub describe_problem: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
    pub advance: Option<f64>,
}
