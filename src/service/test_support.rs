//! Fixtures shared by the service tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use uuid::Uuid;

pub use crate::db::{EmergencyExt, MemoryStore, ProviderExt, ServiceRequestExt, UserExt};
use crate::{
    geo::GeoPoint,
    models::{emergencymodel::Emergency, providermodel::*, usermodel::*},
    service::notification_service::{GuardianNotifier, NotificationError},
};

pub fn point((longitude, latitude): (f64, f64)) -> GeoPoint {
    GeoPoint::new(longitude, latitude).unwrap()
}

pub async fn seed_user(store: &Arc<MemoryStore>, email: &str, mobile: &str) -> User {
    store
        .save_user(NewUser {
            name: "Asha".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            mobile: mobile.to_string(),
            location: Location {
                state: "Karnataka".to_string(),
                district: "Bangalore Urban".to_string(),
                city: "Bangalore".to_string(),
            },
            point: point((77.5946, 12.9716)),
            other_contact: vec![],
        })
        .await
        .unwrap()
}

pub async fn seed_provider(
    store: &Arc<MemoryStore>,
    name: &str,
    provider_type: ProviderType,
    at: (f64, f64),
) -> ServiceProvider {
    store
        .save_provider(NewServiceProvider {
            provider_type,
            name: name.to_string(),
            password_hash: "hash".to_string(),
            mobile: "9000000000".to_string(),
            email: format!("{}@providers.test", name.to_lowercase().replace(' ', ".")),
            location: Location::default(),
            point: point(at),
        })
        .await
        .unwrap()
}

pub async fn move_provider(store: &Arc<MemoryStore>, provider_id: Uuid, to: (f64, f64)) {
    store
        .update_provider(
            provider_id,
            ProviderUpdate {
                point: Some(point(to)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
}

pub async fn set_available(store: &Arc<MemoryStore>, provider_id: Uuid, is_available: bool) {
    store
        .update_provider(
            provider_id,
            ProviderUpdate {
                is_available: Some(is_available),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
}

/// Counts alerts and optionally fails every delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GuardianNotifier for RecordingNotifier {
    async fn notify(&self, user: &User, _emergency: &Emergency) -> Result<(), NotificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotificationError::Delivery {
                failed: user.guardian_emails.len(),
                total: user.guardian_emails.len(),
                last_error: "smtp unreachable".to_string(),
            });
        }
        Ok(())
    }
}
