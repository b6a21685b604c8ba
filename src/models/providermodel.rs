use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoError, GeoPoint};
use super::usermodel::Location;

/// Classification of a provider. Gates which request kinds it can serve:
/// mechanics take service requests, hospitals take emergencies.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "provider_type")]
pub enum ProviderType {
    Hospital,
    Mechanical,
}

impl ProviderType {
    pub fn to_str(&self) -> &str {
        match self {
            ProviderType::Hospital => "Hospital",
            ProviderType::Mechanical => "Mechanical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceProvider {
    pub id: Uuid,
    pub provider_type: ProviderType,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub mobile: String,
    pub email: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub longitude: f64,
    pub latitude: f64,
    pub is_available: bool,
    pub rating: f32,
    pub service_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceProvider {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }

    pub fn location(&self) -> Location {
        Location {
            state: self.state.clone(),
            district: self.district.clone(),
            city: self.city.clone(),
        }
    }

    pub fn is_hospital(&self) -> bool {
        self.provider_type == ProviderType::Hospital
    }
}

/// A provider returned by a radius query, with its distance from the query point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NearbyProvider {
    #[sqlx(flatten)]
    pub provider: ServiceProvider,
    pub distance_m: f64,
}

#[derive(Debug, Clone)]
pub struct NewServiceProvider {
    pub provider_type: ProviderType,
    pub name: String,
    pub password_hash: String,
    pub mobile: String,
    pub email: String,
    pub location: Location,
    pub point: GeoPoint,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    pub is_available: Option<bool>,
    pub rating: Option<f32>,
    pub point: Option<GeoPoint>,
}

/// Result of an admin removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRemoval {
    Removed,
    NotFound,
    /// An accepted request or emergency still points at the provider.
    HasAcceptedWork,
}
