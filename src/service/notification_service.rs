// service/notification_service.rs
use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    config::SmtpConfig,
    mail::mails::send_emergency_alert_email,
    models::{emergencymodel::Emergency, usermodel::User},
};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Emergency {0} has invalid coordinates")]
    InvalidLocation(uuid::Uuid),

    #[error("Failed to alert {failed} of {total} guardians: {last_error}")]
    Delivery {
        failed: usize,
        total: usize,
        last_error: String,
    },
}

/// Delivers the guardian alert for a freshly raised emergency.
/// Callers treat failures as best effort.
#[async_trait]
pub trait GuardianNotifier: Debug + Send + Sync {
    async fn notify(&self, user: &User, emergency: &Emergency) -> Result<(), NotificationError>;
}

/// Mails every guardian address through SMTP.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    smtp: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(smtp: SmtpConfig) -> Self {
        Self { smtp }
    }
}

#[async_trait]
impl GuardianNotifier for EmailNotifier {
    async fn notify(&self, user: &User, emergency: &Emergency) -> Result<(), NotificationError> {
        let point = emergency
            .point()
            .map_err(|_| NotificationError::InvalidLocation(emergency.id))?;
        let location = user.location();

        let deliveries = user.guardian_emails.iter().map(|guardian| {
            send_emergency_alert_email(
                &self.smtp,
                guardian,
                &user.name,
                &user.mobile,
                &location,
                &point,
                emergency.created_at,
            )
        });
        let results = futures::future::join_all(deliveries).await;

        let errors: Vec<String> = results
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();
        let failed = errors.len();
        let last_error = errors.last().cloned().unwrap_or_default();

        if failed > 0 {
            return Err(NotificationError::Delivery {
                failed,
                total: user.guardian_emails.len(),
                last_error,
            });
        }

        tracing::info!(
            "Emergency {} alert sent to {} guardians of user {}",
            emergency.id,
            user.guardian_emails.len(),
            user.id
        );
        Ok(())
    }
}

/// Used when no SMTP server is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl GuardianNotifier for LogNotifier {
    async fn notify(&self, user: &User, emergency: &Emergency) -> Result<(), NotificationError> {
        tracing::info!(
            "Emergency alert for {} ({}) at [{}, {}] would be sent to: {}",
            user.name,
            user.mobile,
            emergency.longitude,
            emergency.latitude,
            user.guardian_emails.join(", ")
        );
        Ok(())
    }
}
