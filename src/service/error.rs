use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{error::HttpError, geo::GeoError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("Service provider {0} not found")]
    ProviderNotFound(Uuid),

    #[error("Service request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Emergency {0} not found")]
    EmergencyNotFound(Uuid),

    #[error("{0}")]
    NotAuthorized(String),

    #[error("Cannot {action}: current status is {current}")]
    InvalidStateTransition {
        action: &'static str,
        current: String,
    },

    #[error("{0}")]
    ProviderNotEligible(String),

    #[error("Service request {0} has already been accepted by another provider")]
    AlreadyAccepted(Uuid),

    #[error("You already have an active emergency ({0})")]
    DuplicateActiveRequest(Uuid),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn invalid_transition(action: &'static str, current: &str) -> Self {
        ServiceError::InvalidStateTransition {
            action,
            current: current.to_string(),
        }
    }

    /// Stable discriminator carried in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::UserNotFound(_)
            | ServiceError::ProviderNotFound(_)
            | ServiceError::RequestNotFound(_)
            | ServiceError::EmergencyNotFound(_) => "not_found",
            ServiceError::NotAuthorized(_) => "not_authorized",
            ServiceError::InvalidStateTransition { .. } => "invalid_state_transition",
            ServiceError::ProviderNotEligible(_) => "provider_not_eligible",
            ServiceError::AlreadyAccepted(_) => "already_accepted",
            ServiceError::DuplicateActiveRequest(_) => "duplicate_active_request",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Database(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::ProviderNotEligible(_) => {
                StatusCode::BAD_REQUEST
            }

            ServiceError::UserNotFound(_)
            | ServiceError::ProviderNotFound(_)
            | ServiceError::RequestNotFound(_)
            | ServiceError::EmergencyNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::NotAuthorized(_) => StatusCode::FORBIDDEN,

            ServiceError::InvalidStateTransition { .. }
            | ServiceError::AlreadyAccepted(_)
            | ServiceError::DuplicateActiveRequest(_)
            | ServiceError::Conflict(_) => StatusCode::CONFLICT,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GeoError> for ServiceError {
    fn from(err: GeoError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        let kind = error.kind();

        let message = match &error {
            ServiceError::Database(db_err) => {
                tracing::error!("database error: {}", db_err);
                "Server Error. Please try again later".to_string()
            }
            _ => error.to_string(),
        };

        HttpError::new(message, status).with_kind(kind)
    }
}
