use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    geo::{GeoError, GeoJsonPoint, GeoPoint},
    models::{
        providermodel::{NearbyProvider, ProviderType, ServiceProvider},
        usermodel::Location,
    },
};

use super::userdtos::{validate_mobile, LocationDto};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct AddProviderDto {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,

    #[validate(custom = "validate_mobile")]
    pub mobile: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate]
    pub location: LocationDto,

    #[serde(deserialize_with = "super::coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "super::coordinate")]
    pub latitude: f64,
}

impl AddProviderDto {
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProviderDto {
    pub is_available: Option<bool>,

    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: Option<f32>,

    #[serde(default, deserialize_with = "super::optional_coordinate")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "super::optional_coordinate")]
    pub latitude: Option<f64>,
}

impl UpdateProviderDto {
    /// Both coordinates or neither.
    pub fn point(&self) -> Result<Option<GeoPoint>, String> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => GeoPoint::new(lon, lat).map(Some).map_err(|e| e.to_string()),
            (None, None) => Ok(None),
            _ => Err("Longitude and latitude must be updated together".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AvailabilityDto {
    pub is_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterProviderDto {
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub location: Location,
    pub point: GeoJsonPoint,
    pub is_available: bool,
    pub rating: f32,
    pub service_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl FilterProviderDto {
    pub fn filter_provider(provider: &ServiceProvider) -> Self {
        FilterProviderDto {
            id: provider.id.to_string(),
            provider_type: provider.provider_type,
            name: provider.name.to_owned(),
            mobile: provider.mobile.to_owned(),
            email: provider.email.to_owned(),
            location: provider.location(),
            point: GeoJsonPoint::new(provider.longitude, provider.latitude),
            is_available: provider.is_available,
            rating: provider.rating,
            service_count: provider.service_count,
            distance_m: None,
            created_at: provider.created_at,
        }
    }

    pub fn from_nearby(nearby: &NearbyProvider) -> Self {
        FilterProviderDto {
            distance_m: Some(nearby.distance_m),
            ..FilterProviderDto::filter_provider(&nearby.provider)
        }
    }

    pub fn filter_providers(providers: &[ServiceProvider]) -> Vec<FilterProviderDto> {
        providers.iter().map(FilterProviderDto::filter_provider).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderData {
    pub provider: FilterProviderDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderResponseDto {
    pub status: String,
    pub data: ProviderData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderListResponseDto {
    pub status: String,
    pub providers: Vec<FilterProviderDto>,
    pub results: usize,
}
