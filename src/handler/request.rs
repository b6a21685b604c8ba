use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CreateServiceRequestDto, RequestMapDto, RequestWithCandidatesDto, Response,
        SelectProviderDto, ServiceRequestDto, ServiceRequestListResponseDto,
        ServiceRequestResponseDto, UpdateServiceRequestDto,
    },
    error::HttpError,
    middleware::{role_check, AuthenticatedActor},
    models::usermodel::UserRole,
    AppState,
};

pub fn request_handler() -> Router {
    let owner_only = Router::new()
        .route("/", post(create_request))
        .route("/mine", get(my_requests))
        .route("/:id/select", post(select_provider))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::User])
        }));

    owner_only
        .route(
            "/:id",
            get(get_request)
                .layer(middleware::from_fn(|req: Request, next: Next| {
                    role_check(req, next, vec![UserRole::User, UserRole::Admin])
                }))
                .merge(put(update_request).delete(cancel_request).layer(middleware::from_fn(
                    |req: Request, next: Next| role_check(req, next, vec![UserRole::User]),
                ))),
        )
        .route(
            "/:id/map",
            get(request_map).layer(middleware::from_fn(|req: Request, next: Next| {
                role_check(
                    req,
                    next,
                    vec![UserRole::User, UserRole::ServiceProvider, UserRole::Admin],
                )
            })),
        )
}

pub async fn create_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<CreateServiceRequestDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = actor.user()?;
    let created = app_state
        .matching_service
        .create_service_request(user.id, body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ServiceRequestResponseDto {
            status: "success".to_string(),
            data: RequestWithCandidatesDto::from(&created),
        }),
    ))
}

pub async fn my_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    let requests = app_state
        .matching_service
        .list_my_service_requests(user.id)
        .await?;

    Ok(Json(ServiceRequestListResponseDto {
        status: "success".to_string(),
        results: requests.len(),
        requests: requests.iter().map(RequestWithCandidatesDto::from).collect(),
    }))
}

pub async fn get_request(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .matching_service
        .get_service_request(actor.viewer(), id)
        .await?;

    Ok(Json(ServiceRequestResponseDto {
        status: "success".to_string(),
        data: RequestWithCandidatesDto::from(&request),
    }))
}

pub async fn update_request(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateServiceRequestDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = actor.user()?;
    let updated = app_state
        .matching_service
        .update_service_request(user.id, id, body.into())
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "request": ServiceRequestDto::filter_request(&updated),
    })))
}

pub async fn cancel_request(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    app_state.matching_service.cancel_request(user.id, id).await?;

    Ok(Json(Response {
        status: "success",
        message: "Service request cancelled".to_string(),
    }))
}

pub async fn select_provider(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<SelectProviderDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    let user = actor.user()?;
    let request = app_state
        .matching_service
        .user_select_provider(user.id, id, body.provider_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Provider selected, waiting for confirmation",
        "request": ServiceRequestDto::filter_request(&request),
    })))
}

pub async fn request_map(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let map = app_state
        .matching_service
        .request_map(actor.viewer(), id)
        .await?;

    Ok(Json(RequestMapDto::from(&map)))
}
