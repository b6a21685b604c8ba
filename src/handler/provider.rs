use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    dtos::{
        AvailabilityDto, FilterProviderDto, ProviderData, ProviderRequestGroupsDto,
        ProviderRequestListResponseDto, ProviderResponseDto, ServiceRequestDto,
    },
    error::HttpError,
    handler::store_error,
    middleware::{role_check, AuthenticatedActor},
    models::{providermodel::ProviderUpdate, usermodel::UserRole},
    AppState,
};

pub fn provider_handler() -> Router {
    Router::new()
        .route("/requests", get(provider_requests))
        .route("/requests/accepted", get(accepted_requests))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/complete", post(complete_request))
        .route("/availability", put(set_availability))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::ServiceProvider])
        }))
}

pub async fn provider_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let groups = app_state
        .matching_service
        .list_provider_requests(provider.id)
        .await?;

    Ok(Json(ProviderRequestGroupsDto::from(&groups)))
}

pub async fn accepted_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let views = app_state
        .matching_service
        .list_accepted_requests(provider.id)
        .await?;

    Ok(Json(ProviderRequestListResponseDto::from_views(&views)))
}

pub async fn accept_request(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let request = app_state
        .matching_service
        .provider_accept_request(provider.id, id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Service request accepted",
        "request": ServiceRequestDto::filter_request(&request),
    })))
}

pub async fn complete_request(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let request = app_state
        .matching_service
        .complete_request(provider.id, id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Service request completed",
        "request": ServiceRequestDto::filter_request(&request),
    })))
}

pub async fn set_availability(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<AvailabilityDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;

    let updated = app_state
        .db_client
        .update_provider(
            provider.id,
            ProviderUpdate {
                is_available: Some(body.is_available),
                ..Default::default()
            },
        )
        .await
        .map_err(store_error)?
        .ok_or_else(|| HttpError::not_found(format!("Service provider {} not found", provider.id)))?;

    tracing::info!(
        "Provider {} is now {}",
        updated.id,
        if updated.is_available { "available" } else { "unavailable" }
    );

    Ok(Json(ProviderResponseDto {
        status: "success".to_string(),
        data: ProviderData {
            provider: FilterProviderDto::filter_provider(&updated),
        },
    }))
}
