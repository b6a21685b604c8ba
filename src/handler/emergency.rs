use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    dtos::{
        CreateEmergencyDto, DeleteEmergencyResponseDto, EmergencyDto, EmergencyListResponseDto,
        EmergencyMapDto, EmergencyResponseDto,
    },
    error::HttpError,
    middleware::{role_check, AuthenticatedActor},
    models::usermodel::UserRole,
    AppState,
};

pub fn emergency_handler() -> Router {
    let user_routes = Router::new()
        .route("/", post(raise_emergency))
        .route("/mine", get(my_emergencies))
        .route("/:id", delete(delete_emergency))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::User])
        }));

    let provider_routes = Router::new()
        .route("/nearby", get(nearby_emergencies))
        .route("/accepted", get(accepted_emergencies))
        .route("/closed", get(closed_emergencies))
        .route("/map", get(emergency_map))
        .route("/:id/accept", post(accept_emergency))
        .route("/:id/close", post(close_emergency))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::ServiceProvider])
        }));

    user_routes.merge(provider_routes)
}

pub async fn raise_emergency(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<CreateEmergencyDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    let emergency = app_state
        .emergency_service
        .create_emergency(user.id, body.longitude, body.latitude)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EmergencyResponseDto {
            status: "success".to_string(),
            emergency: EmergencyDto::filter_emergency(&emergency),
        }),
    ))
}

pub async fn my_emergencies(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    let views = app_state
        .emergency_service
        .list_my_emergencies(user.id)
        .await?;

    Ok(Json(EmergencyListResponseDto::from_views(&views)))
}

pub async fn delete_emergency(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    let outcome = app_state
        .emergency_service
        .delete_emergency(user.id, id)
        .await?;

    Ok(Json(DeleteEmergencyResponseDto::from(outcome)))
}

pub async fn nearby_emergencies(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let views = app_state
        .emergency_service
        .list_nearby_pending_for_provider(provider.id)
        .await?;

    Ok(Json(EmergencyListResponseDto::from_views(&views)))
}

pub async fn accepted_emergencies(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let views = app_state
        .emergency_service
        .list_accepted_emergencies(provider.id)
        .await?;

    Ok(Json(EmergencyListResponseDto::from_views(&views)))
}

pub async fn closed_emergencies(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let views = app_state
        .emergency_service
        .list_closed_emergencies(provider.id)
        .await?;

    Ok(Json(EmergencyListResponseDto::from_views(&views)))
}

pub async fn emergency_map(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let map = app_state.emergency_service.emergency_map(provider.id).await?;

    Ok(Json(EmergencyMapDto::from(&map)))
}

pub async fn accept_emergency(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let emergency = app_state
        .emergency_service
        .accept_emergency(provider.id, id)
        .await?;

    Ok(Json(EmergencyResponseDto {
        status: "success".to_string(),
        emergency: EmergencyDto::filter_emergency(&emergency),
    }))
}

pub async fn close_emergency(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let provider = actor.provider()?;
    let emergency = app_state
        .emergency_service
        .close_emergency(provider.id, id)
        .await?;

    Ok(Json(EmergencyResponseDto {
        status: "success".to_string(),
        emergency: EmergencyDto::filter_emergency(&emergency),
    }))
}
