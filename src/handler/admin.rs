use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        AddProviderDto, FilterProviderDto, ProviderData, ProviderListResponseDto,
        ProviderResponseDto, Response, UpdateProviderDto,
    },
    error::HttpError,
    handler::store_error,
    middleware::{role_check, AuthenticatedActor},
    models::{
        providermodel::{NewServiceProvider, ProviderRemoval, ProviderUpdate},
        usermodel::UserRole,
    },
    utils::password,
    AppState,
};

pub fn admin_handler() -> Router {
    Router::new()
        .route("/providers", get(list_providers).post(add_provider))
        .route("/providers/:id", put(update_provider).delete(delete_provider))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::Admin])
        }))
}

fn provider_not_found(id: Uuid) -> HttpError {
    HttpError::not_found(format!("Service provider {} not found", id))
}

pub async fn add_provider(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<AddProviderDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    let (_, admin_email) = actor.admin()?;
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let point = body.point().map_err(|e| HttpError::bad_request(e.to_string()))?;

    let hashed_password = password::hash(&body.password)
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let provider = app_state
        .db_client
        .save_provider(NewServiceProvider {
            provider_type: body.provider_type,
            name: body.name,
            password_hash: hashed_password,
            mobile: body.mobile,
            email: body.email,
            location: body.location.into(),
            point,
        })
        .await
        .map_err(store_error)?;

    tracing::info!(
        "Admin {} added {} provider {} ({})",
        admin_email,
        provider.provider_type.to_str(),
        provider.name,
        provider.id
    );

    Ok((
        StatusCode::CREATED,
        Json(ProviderResponseDto {
            status: "success".to_string(),
            data: ProviderData {
                provider: FilterProviderDto::filter_provider(&provider),
            },
        }),
    ))
}

pub async fn list_providers(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let providers = app_state
        .db_client
        .get_providers()
        .await
        .map_err(store_error)?;

    Ok(Json(ProviderListResponseDto {
        status: "success".to_string(),
        results: providers.len(),
        providers: FilterProviderDto::filter_providers(&providers),
    }))
}

pub async fn update_provider(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateProviderDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let point = body.point().map_err(HttpError::bad_request)?;

    let provider = app_state
        .db_client
        .update_provider(
            id,
            ProviderUpdate {
                is_available: body.is_available,
                rating: body.rating,
                point,
            },
        )
        .await
        .map_err(store_error)?
        .ok_or_else(|| provider_not_found(id))?;

    Ok(Json(ProviderResponseDto {
        status: "success".to_string(),
        data: ProviderData {
            provider: FilterProviderDto::filter_provider(&provider),
        },
    }))
}

pub async fn delete_provider(
    Path(id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    let (admin_id, _) = actor.admin()?;
    let removal = app_state
        .db_client
        .delete_provider(id)
        .await
        .map_err(store_error)?;

    match removal {
        ProviderRemoval::Removed => {}
        ProviderRemoval::NotFound => return Err(provider_not_found(id)),
        ProviderRemoval::HasAcceptedWork => {
            return Err(HttpError::unique_constraint_violation(
                "Service provider still has accepted requests or emergencies",
            )
            .with_kind("provider_busy"))
        }
    }

    tracing::info!("Admin {} removed provider {}", admin_id, id);

    Ok(Json(Response {
        status: "success",
        message: "Service provider deleted".to_string(),
    }))
}
