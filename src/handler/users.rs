use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    dtos::{FilterUserDto, GuardianEmailsDto, UpdateProfileDto, UserData, UserResponseDto},
    error::{ErrorMessage, HttpError},
    handler::store_error,
    middleware::{role_check, AuthenticatedActor},
    models::usermodel::{User, UserProfileUpdate, UserRole},
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/guardian-emails", put(update_guardian_emails))
        .layer(middleware::from_fn(|req: Request, next: Next| {
            role_check(req, next, vec![UserRole::User])
        }))
}

fn user_response(user: &User) -> Json<UserResponseDto> {
    Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(user),
        },
    })
}

pub async fn get_me(
    Extension(actor): Extension<AuthenticatedActor>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(user_response(actor.user()?))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateProfileDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = actor.user()?;

    let updated = app_state
        .db_client
        .update_user_profile(
            user.id,
            UserProfileUpdate {
                name: body.name,
                mobile: body.mobile,
                location: body.location.map(Into::into),
                other_contact: body.other_contact,
                guardian_emails: body.guardian_emails,
            },
        )
        .await
        .map_err(store_error)?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    Ok(user_response(&updated))
}

pub async fn update_guardian_emails(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedActor>,
    WithRejection(Json(body), _): WithRejection<Json<GuardianEmailsDto>, HttpError>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = actor.user()?;

    let updated = app_state
        .db_client
        .update_guardian_emails(user.id, body.guardian_emails)
        .await
        .map_err(store_error)?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    tracing::info!(
        "User {} now has {} guardian emails",
        updated.id,
        updated.guardian_emails.len()
    );

    Ok(user_response(&updated))
}
