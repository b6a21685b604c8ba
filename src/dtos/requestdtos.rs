use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    geo::{GeoJsonPoint, GeoPoint},
    models::requestmodel::{RequestStatus, RequestTitle, ServiceRequest, VehicleInfo},
    service::matching_service::{
        ActivityKind, NearbyActivity, ProviderRequestGroups, ProviderRequestView, RequestMap,
        RequestWithCandidates, ServiceRequestDraft, ServiceRequestEdit, VehicleDraft,
    },
};

use super::{providerdtos::FilterProviderDto, userdtos::UserContactDto};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct VehicleInfoDto {
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Vehicle type is required"))]
    pub vehicle_type: String,

    #[serde(default)]
    pub number: String,

    #[serde(default)]
    pub name: String,
}

impl From<VehicleInfoDto> for VehicleDraft {
    fn from(dto: VehicleInfoDto) -> Self {
        VehicleDraft {
            vehicle_type: dto.vehicle_type,
            number: dto.number,
            name: dto.name,
        }
    }
}

/// Title and vehicle type arrive as plain strings; the matching service
/// parses them so that every input error surfaces the same way.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequestDto {
    #[serde(deserialize_with = "super::coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "super::coordinate")]
    pub latitude: f64,

    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,

    #[serde(default)]
    pub describe_problem: String,

    #[validate]
    pub vehicle_info: VehicleInfoDto,

    #[serde(default)]
    pub advance: f64,
}

impl From<CreateServiceRequestDto> for ServiceRequestDraft {
    fn from(dto: CreateServiceRequestDto) -> Self {
        ServiceRequestDraft {
            longitude: dto.longitude,
            latitude: dto.latitude,
            title: dto.title,
            describe_problem: dto.describe_problem,
            vehicle: dto.vehicle_info.into(),
            advance: dto.advance,
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateServiceRequestDto {
    #[validate(length(min = 1, message = "Problem description cannot be empty"))]
    pub describe_problem: Option<String>,

    #[validate]
    pub vehicle_info: Option<VehicleInfoDto>,

    pub advance: Option<f64>,
}

impl From<UpdateServiceRequestDto> for ServiceRequestEdit {
    fn from(dto: UpdateServiceRequestDto) -> Self {
        ServiceRequestEdit {
            describe_problem: dto.describe_problem,
            vehicle: dto.vehicle_info.map(Into::into),
            advance: dto.advance,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectProviderDto {
    pub provider_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequestDto {
    pub id: String,
    pub user_id: String,
    pub title: RequestTitle,
    pub describe_problem: String,
    pub vehicle_info: VehicleInfo,
    pub status: RequestStatus,
    pub point: GeoJsonPoint,
    pub advance: f64,
    pub selected_provider: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequestDto {
    pub fn filter_request(request: &ServiceRequest) -> Self {
        ServiceRequestDto {
            id: request.id.to_string(),
            user_id: request.user_id.to_string(),
            title: request.title,
            describe_problem: request.describe_problem.to_owned(),
            vehicle_info: request.vehicle_info(),
            status: request.status,
            point: GeoJsonPoint::new(request.longitude, request.latitude),
            advance: request.advance,
            selected_provider: request.selected_provider.map(|id| id.to_string()),
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestWithCandidatesDto {
    pub request: ServiceRequestDto,
    pub candidates: Vec<FilterProviderDto>,
}

impl From<&RequestWithCandidates> for RequestWithCandidatesDto {
    fn from(value: &RequestWithCandidates) -> Self {
        RequestWithCandidatesDto {
            request: ServiceRequestDto::filter_request(&value.request),
            candidates: value
                .candidates
                .iter()
                .map(FilterProviderDto::from_nearby)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequestResponseDto {
    pub status: String,
    pub data: RequestWithCandidatesDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequestListResponseDto {
    pub status: String,
    pub requests: Vec<RequestWithCandidatesDto>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderRequestDto {
    pub request: ServiceRequestDto,
    pub user: Option<UserContactDto>,
}

impl From<&ProviderRequestView> for ProviderRequestDto {
    fn from(view: &ProviderRequestView) -> Self {
        ProviderRequestDto {
            request: ServiceRequestDto::filter_request(&view.request),
            user: view.user.as_ref().map(UserContactDto::from_user),
        }
    }
}

fn to_dtos(views: &[ProviderRequestView]) -> Vec<ProviderRequestDto> {
    views.iter().map(ProviderRequestDto::from).collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderRequestGroupsDto {
    pub status: String,
    pub pending: Vec<ProviderRequestDto>,
    pub accepted: Vec<ProviderRequestDto>,
    pub closed: Vec<ProviderRequestDto>,
}

impl From<&ProviderRequestGroups> for ProviderRequestGroupsDto {
    fn from(groups: &ProviderRequestGroups) -> Self {
        ProviderRequestGroupsDto {
            status: "success".to_string(),
            pending: to_dtos(&groups.pending),
            accepted: to_dtos(&groups.accepted),
            closed: to_dtos(&groups.closed),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderRequestListResponseDto {
    pub status: String,
    pub requests: Vec<ProviderRequestDto>,
    pub count: usize,
}

impl ProviderRequestListResponseDto {
    pub fn from_views(views: &[ProviderRequestView]) -> Self {
        ProviderRequestListResponseDto {
            status: "success".to_string(),
            requests: to_dtos(views),
            count: views.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestMapDto {
    pub status: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    pub point: GeoJsonPoint,
    pub vehicle_info: VehicleInfo,
    pub user: Option<UserContactDto>,
    pub providers: Vec<FilterProviderDto>,
}

impl From<&RequestMap> for RequestMapDto {
    fn from(map: &RequestMap) -> Self {
        RequestMapDto {
            status: "success".to_string(),
            request_id: map.request.id.to_string(),
            request_status: map.request.status,
            point: GeoJsonPoint::new(map.request.longitude, map.request.latitude),
            vehicle_info: map.request.vehicle_info(),
            user: map.user.as_ref().map(UserContactDto::from_user),
            providers: FilterProviderDto::filter_providers(&map.providers),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NearbyActivityDto {
    pub kind: ActivityKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<RequestTitle>,
    pub point: GeoJsonPoint,
    pub distance_m: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<&NearbyActivity> for NearbyActivityDto {
    fn from(activity: &NearbyActivity) -> Self {
        NearbyActivityDto {
            kind: activity.kind,
            id: activity.id.to_string(),
            title: activity.title,
            point: GeoPoint::to_geojson(&activity.point),
            distance_m: activity.distance_m,
            created_at: activity.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NearbyActivityResponseDto {
    pub status: String,
    pub activity: Vec<NearbyActivityDto>,
    pub results: usize,
}
