pub mod auth;
pub mod users;
pub mod request;
pub mod provider;
pub mod emergency;
pub mod activity;
pub mod admin;

use crate::error::{ErrorMessage, HttpError};

/// Unique violations become 409s naming the clashing field. Anything else
/// is a 500 with the details kept in the log.
pub(crate) fn store_error(err: sqlx::Error) -> HttpError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            let message = if constraint.contains("mobile") {
                ErrorMessage::MobileExist
            } else if constraint.contains("name") {
                ErrorMessage::ProviderNameExist
            } else {
                ErrorMessage::EmailExist
            };
            return HttpError::unique_constraint_violation(message.to_string());
        }
    }

    tracing::error!("store error: {}", err);
    HttpError::server_error(ErrorMessage::ServerError.to_string())
}
