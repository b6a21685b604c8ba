use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    error::{ErrorMessage, HttpError},
    models::{providermodel::ServiceProvider, usermodel::{User, UserRole}},
    service::matching_service::Viewer,
    utils::token,
    AppState,
};

/// The identity behind a valid session token.
#[derive(Debug, Clone)]
pub enum AuthenticatedActor {
    User(User),
    Provider(ServiceProvider),
    Admin { id: Uuid, email: String },
}

impl AuthenticatedActor {
    pub fn role(&self) -> UserRole {
        match self {
            AuthenticatedActor::User(_) => UserRole::User,
            AuthenticatedActor::Provider(_) => UserRole::ServiceProvider,
            AuthenticatedActor::Admin { .. } => UserRole::Admin,
        }
    }

    pub fn viewer(&self) -> Viewer {
        match self {
            AuthenticatedActor::User(user) => Viewer::User(user.id),
            AuthenticatedActor::Provider(provider) => Viewer::Provider(provider.id),
            AuthenticatedActor::Admin { .. } => Viewer::Admin,
        }
    }

    pub fn user(&self) -> Result<&User, HttpError> {
        match self {
            AuthenticatedActor::User(user) => Ok(user),
            _ => Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string())),
        }
    }

    pub fn provider(&self) -> Result<&ServiceProvider, HttpError> {
        match self {
            AuthenticatedActor::Provider(provider) => Ok(provider),
            _ => Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string())),
        }
    }

    /// Credential id and email of the admin session.
    pub fn admin(&self) -> Result<(Uuid, &str), HttpError> {
        match self {
            AuthenticatedActor::Admin { id, email } => Ok((*id, email.as_str())),
            _ => Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string())),
        }
    }
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(|token| token.to_owned())
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(&req))
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let claims = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let subject_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let gone = || HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string());

    let actor = match claims.role {
        UserRole::User => {
            let user = app_state
                .db_client
                .get_user(subject_id)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?
                .ok_or_else(gone)?;
            AuthenticatedActor::User(user)
        }
        UserRole::ServiceProvider => {
            let provider = app_state
                .db_client
                .get_provider(subject_id)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?
                .ok_or_else(gone)?;
            AuthenticatedActor::Provider(provider)
        }
        UserRole::Admin => {
            let email = app_state.env.admin_email.clone().ok_or_else(gone)?;
            let credential = app_state
                .db_client
                .get_credential(&email)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?
                .filter(|c| c.role == UserRole::Admin && c.subject_id == subject_id)
                .ok_or_else(gone)?;
            AuthenticatedActor::Admin {
                id: credential.subject_id,
                email: credential.email,
            }
        }
    };

    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let actor = req
        .extensions()
        .get::<AuthenticatedActor>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&actor.role()) {
        tracing::debug!("{} denied for role {}", req.uri().path(), actor.role().to_str());
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn role_accessors_reject_other_actors() {
        let admin_id = Uuid::new_v4();
        let admin = AuthenticatedActor::Admin {
            id: admin_id,
            email: "admin@roadrescue.test".to_string(),
        };

        assert_eq!(admin.role(), UserRole::Admin);
        assert_eq!(admin.admin().unwrap(), (admin_id, "admin@roadrescue.test"));
        assert_eq!(admin.user().unwrap_err().status, StatusCode::FORBIDDEN);
        assert_eq!(admin.provider().unwrap_err().status, StatusCode::FORBIDDEN);
        assert!(matches!(admin.viewer(), Viewer::Admin));
    }
}
