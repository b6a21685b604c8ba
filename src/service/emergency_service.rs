// service/emergency_service.rs
use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use crate::{
    db::Store,
    geo::{validate_distance, GeoPoint},
    models::{emergencymodel::*, providermodel::ServiceProvider, usermodel::User},
    service::{error::ServiceError, notification_service::GuardianNotifier},
};

/// How many times a delete re-reads the emergency after losing a race.
const DELETE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct EmergencyView {
    pub emergency: Emergency,
    pub user: Option<User>,
    pub provider: Option<ServiceProvider>,
    pub distance_m: Option<f64>,
}

impl EmergencyView {
    fn bare(emergency: Emergency) -> Self {
        Self {
            emergency,
            user: None,
            provider: None,
            distance_m: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmergencyMap {
    pub provider: ServiceProvider,
    pub pending: Vec<EmergencyView>,
    pub accepted: Vec<EmergencyView>,
}

#[derive(Debug, Clone)]
pub struct EmergencyService {
    db_client: Arc<dyn Store>,
    notifier: Arc<dyn GuardianNotifier>,
    radius_m: f64,
    map_radius_m: f64,
}

impl EmergencyService {
    pub fn new(
        db_client: Arc<dyn Store>,
        notifier: Arc<dyn GuardianNotifier>,
        radius_m: f64,
        map_radius_m: f64,
    ) -> Self {
        Self {
            db_client,
            notifier,
            radius_m,
            map_radius_m,
        }
    }

    async fn load_emergency(&self, emergency_id: Uuid) -> Result<Emergency, ServiceError> {
        self.db_client
            .get_emergency(emergency_id)
            .await?
            .ok_or(ServiceError::EmergencyNotFound(emergency_id))
    }

    async fn load_provider(&self, provider_id: Uuid) -> Result<ServiceProvider, ServiceError> {
        self.db_client
            .get_provider(provider_id)
            .await?
            .ok_or(ServiceError::ProviderNotFound(provider_id))
    }

    /// Persists a pending emergency, then alerts the user's guardians.
    /// The alert is best effort: its failure is logged and the emergency stays.
    pub async fn create_emergency(
        &self,
        user_id: Uuid,
        longitude: f64,
        latitude: f64,
    ) -> Result<Emergency, ServiceError> {
        let point = GeoPoint::new(longitude, latitude)?;

        let user = self
            .db_client
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let emergency = match self.db_client.create_emergency(user_id, point).await? {
            Some(emergency) => emergency,
            None => {
                let active = self
                    .db_client
                    .get_emergencies_by_user(user_id)
                    .await?
                    .into_iter()
                    .find(|e| e.status.is_active());

                match active {
                    Some(active) => return Err(ServiceError::DuplicateActiveRequest(active.id)),
                    // the blocking emergency finished in between
                    None => self
                        .db_client
                        .create_emergency(user_id, point)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::Conflict(
                                "An active emergency already exists, please retry".to_string(),
                            )
                        })?,
                }
            }
        };

        tracing::info!("Emergency {} raised by user {}", emergency.id, user_id);

        if user.has_guardians() {
            if let Err(e) = self.notifier.notify(&user, &emergency).await {
                tracing::warn!(
                    "Guardian notification for emergency {} failed: {}",
                    emergency.id,
                    e
                );
            }
        } else {
            tracing::debug!("User {} has no guardian emails configured", user_id);
        }

        Ok(emergency)
    }

    pub async fn accept_emergency(
        &self,
        provider_id: Uuid,
        emergency_id: Uuid,
    ) -> Result<Emergency, ServiceError> {
        let provider = self.load_provider(provider_id).await?;
        if !provider.is_hospital() {
            return Err(ServiceError::ProviderNotEligible(
                "Only hospitals can accept emergencies".to_string(),
            ));
        }

        if let Some(emergency) = self
            .db_client
            .accept_emergency(emergency_id, provider_id)
            .await?
        {
            tracing::info!("Hospital {} accepted emergency {}", provider_id, emergency_id);
            return Ok(emergency);
        }

        let current = self.load_emergency(emergency_id).await?;
        Err(ServiceError::invalid_transition(
            "accept emergency",
            current.status.to_str(),
        ))
    }

    pub async fn close_emergency(
        &self,
        provider_id: Uuid,
        emergency_id: Uuid,
    ) -> Result<Emergency, ServiceError> {
        if let Some(emergency) = self
            .db_client
            .close_emergency(emergency_id, provider_id)
            .await?
        {
            if let Err(e) = self.db_client.increment_service_count(provider_id).await {
                tracing::warn!(
                    "Failed to bump service count of provider {}: {}",
                    provider_id,
                    e
                );
            }
            tracing::info!("Hospital {} closed emergency {}", provider_id, emergency_id);
            return Ok(emergency);
        }

        let current = self.load_emergency(emergency_id).await?;
        if current.service_provider != Some(provider_id) {
            return Err(ServiceError::NotAuthorized(
                "Emergency is not assigned to you".to_string(),
            ));
        }
        Err(ServiceError::invalid_transition(
            "close emergency",
            current.status.to_str(),
        ))
    }

    /// Pending emergencies are removed; accepted ones are kept as
    /// `deleted_by_user`. Closed and already deleted emergencies are final.
    pub async fn delete_emergency(
        &self,
        user_id: Uuid,
        emergency_id: Uuid,
    ) -> Result<DeleteOutcome, ServiceError> {
        for _ in 0..DELETE_ATTEMPTS {
            let current = self.load_emergency(emergency_id).await?;
            if current.user_id != user_id {
                return Err(ServiceError::NotAuthorized(
                    "Not authorized to delete this emergency".to_string(),
                ));
            }

            match current.status {
                EmergencyStatus::Pending => {
                    if self
                        .db_client
                        .delete_pending_emergency(emergency_id, user_id)
                        .await?
                    {
                        tracing::info!("User {} removed emergency {}", user_id, emergency_id);
                        return Ok(DeleteOutcome::Removed);
                    }
                }
                EmergencyStatus::Accepted => {
                    if self
                        .db_client
                        .mark_emergency_deleted_by_user(emergency_id, user_id)
                        .await?
                        .is_some()
                    {
                        tracing::info!(
                            "User {} withdrew dispatched emergency {}",
                            user_id,
                            emergency_id
                        );
                        return Ok(DeleteOutcome::MarkedDeletedByUser);
                    }
                }
                status => {
                    return Err(ServiceError::invalid_transition(
                        "delete emergency",
                        status.to_str(),
                    ))
                }
            }
        }

        Err(ServiceError::Conflict(
            "Emergency changed while it was being deleted, please retry".to_string(),
        ))
    }

    async fn with_users(&self, views: &mut [EmergencyView]) -> Result<(), ServiceError> {
        let mut users: HashMap<Uuid, Option<User>> = HashMap::new();
        for view in views.iter_mut() {
            let user_id = view.emergency.user_id;
            if !users.contains_key(&user_id) {
                users.insert(user_id, self.db_client.get_user(user_id).await?);
            }
            view.user = users.get(&user_id).cloned().flatten();
        }
        Ok(())
    }

    /// Pending emergencies around a hospital, nearest first. Providers of
    /// any other type get an empty list.
    pub async fn list_nearby_pending_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<EmergencyView>, ServiceError> {
        let provider = self.load_provider(provider_id).await?;
        if !provider.is_hospital() {
            return Ok(vec![]);
        }

        let nearby = self
            .db_client
            .find_nearby_emergencies(
                provider.point()?,
                validate_distance(self.radius_m)?,
                &[EmergencyStatus::Pending],
            )
            .await?;

        let mut views: Vec<EmergencyView> = nearby
            .into_iter()
            .map(|n| EmergencyView {
                distance_m: Some(n.distance_m),
                ..EmergencyView::bare(n.emergency)
            })
            .collect();
        self.with_users(&mut views).await?;
        Ok(views)
    }

    pub async fn list_my_emergencies(&self, user_id: Uuid) -> Result<Vec<EmergencyView>, ServiceError> {
        let emergencies = self.db_client.get_emergencies_by_user(user_id).await?;

        let mut views = Vec::with_capacity(emergencies.len());
        for emergency in emergencies {
            let provider = match emergency.service_provider {
                Some(id) => self.db_client.get_provider(id).await?,
                None => None,
            };
            views.push(EmergencyView {
                provider,
                ..EmergencyView::bare(emergency)
            });
        }
        Ok(views)
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        status: EmergencyStatus,
    ) -> Result<Vec<EmergencyView>, ServiceError> {
        let emergencies = self
            .db_client
            .get_emergencies_for_provider(provider_id, status)
            .await?;

        let mut views: Vec<EmergencyView> = emergencies.into_iter().map(EmergencyView::bare).collect();
        self.with_users(&mut views).await?;
        Ok(views)
    }

    pub async fn list_accepted_emergencies(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<EmergencyView>, ServiceError> {
        self.list_for_provider(provider_id, EmergencyStatus::Accepted).await
    }

    pub async fn list_closed_emergencies(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<EmergencyView>, ServiceError> {
        self.list_for_provider(provider_id, EmergencyStatus::Closed).await
    }

    /// Pending and accepted emergencies around the provider for map display.
    pub async fn emergency_map(&self, provider_id: Uuid) -> Result<EmergencyMap, ServiceError> {
        let provider = self.load_provider(provider_id).await?;

        let nearby = self
            .db_client
            .find_nearby_emergencies(
                provider.point()?,
                validate_distance(self.map_radius_m)?,
                &[EmergencyStatus::Pending, EmergencyStatus::Accepted],
            )
            .await?;

        let mut views: Vec<EmergencyView> = nearby
            .into_iter()
            .map(|n| EmergencyView {
                distance_m: Some(n.distance_m),
                ..EmergencyView::bare(n.emergency)
            })
            .collect();
        self.with_users(&mut views).await?;

        let (pending, accepted): (Vec<EmergencyView>, Vec<EmergencyView>) = views
            .into_iter()
            .partition(|v| v.emergency.status == EmergencyStatus::Pending);

        Ok(EmergencyMap {
            provider,
            pending,
            accepted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::providermodel::ProviderType,
        service::test_support::*,
    };

    const BANGALORE: (f64, f64) = (77.5946, 12.9716);

    fn service(store: &Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> EmergencyService {
        EmergencyService::new(store.clone(), notifier, 10_000.0, 100_000.0)
    }

    async fn user_with_guardians(store: &Arc<MemoryStore>) -> User {
        let user = seed_user(store, "asha@example.com", "9876543210").await;
        store
            .update_guardian_emails(user.id, vec!["guardian@example.com".to_string()])
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn second_active_emergency_is_rejected_until_closed() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let hospital = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let first = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        assert_eq!(first.status, EmergencyStatus::Pending);

        let err = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateActiveRequest(id) if id == first.id));

        emergencies.accept_emergency(hospital.id, first.id).await.unwrap();
        let err = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_active_request");

        emergencies.close_emergency(hospital.id, first.id).await.unwrap();
        let second = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn concurrent_creates_leave_one_active_emergency() {
        let store = Arc::new(MemoryStore::new());
        let user_id = seed_user(&store, "asha@example.com", "9876543210").await.id;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let a = {
            let emergencies = emergencies.clone();
            tokio::spawn(async move { emergencies.create_emergency(user_id, BANGALORE.0, BANGALORE.1).await })
        };
        let b = {
            let emergencies = emergencies.clone();
            tokio::spawn(async move { emergencies.create_emergency(user_id, BANGALORE.0, BANGALORE.1).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let created: Vec<&Emergency> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(created.len(), 1);
        let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(rejected, ServiceError::DuplicateActiveRequest(id) if *id == created[0].id));

        let stored = store.get_emergencies_by_user(user_id).await.unwrap();
        assert_eq!(stored.iter().filter(|e| e.status.is_active()).count(), 1);
    }

    #[tokio::test]
    async fn concurrent_hospital_accepts_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let first = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let second = seed_provider(&store, "General Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let emergency = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        let emergency_id = emergency.id;

        let a = {
            let emergencies = emergencies.clone();
            tokio::spawn(async move { emergencies.accept_emergency(first.id, emergency_id).await })
        };
        let b = {
            let emergencies = emergencies.clone();
            tokio::spawn(async move { emergencies.accept_emergency(second.id, emergency_id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<&Emergency> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(loser, ServiceError::InvalidStateTransition { .. }));

        let stored = store.get_emergency(emergency_id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmergencyStatus::Accepted);
        assert_eq!(stored.service_provider, winners[0].service_provider);
    }

    #[tokio::test]
    async fn guardians_are_notified_and_failures_do_not_roll_back() {
        let store = Arc::new(MemoryStore::new());
        let user = user_with_guardians(&store).await;
        let notifier = Arc::new(RecordingNotifier::failing());
        let emergencies = service(&store, notifier.clone());

        let emergency = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();

        assert_eq!(notifier.calls(), 1);
        let stored = store.get_emergency(emergency.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmergencyStatus::Pending);
    }

    #[tokio::test]
    async fn users_without_guardians_trigger_no_alert() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let notifier = Arc::new(RecordingNotifier::default());
        let emergencies = service(&store, notifier.clone());

        emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        assert_eq!(notifier.calls(), 0);
    }

    #[tokio::test]
    async fn delete_removes_pending_and_soft_deletes_accepted() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let hospital = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let pending = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        let outcome = emergencies.delete_emergency(user.id, pending.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
        let err = emergencies.delete_emergency(user.id, pending.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmergencyNotFound(_)));

        let accepted = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        emergencies.accept_emergency(hospital.id, accepted.id).await.unwrap();
        let outcome = emergencies.delete_emergency(user.id, accepted.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::MarkedDeletedByUser);

        let stored = store.get_emergency(accepted.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmergencyStatus::DeletedByUser);

        // deleted_by_user is terminal
        let err = emergencies.close_emergency(hospital.id, accepted.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
        let err = emergencies.delete_emergency(user.id, accepted.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn only_the_owner_may_delete() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let other = seed_user(&store, "ravi@example.com", "9876543211").await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let emergency = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        let err = emergencies.delete_emergency(other.id, emergency.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn mechanics_see_nothing_and_cannot_accept() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let hospital = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let emergency = emergencies
            .create_emergency(user.id, 77.60, 12.98)
            .await
            .unwrap();

        assert!(emergencies
            .list_nearby_pending_for_provider(garage.id)
            .await
            .unwrap()
            .is_empty());
        let err = emergencies.accept_emergency(garage.id, emergency.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ProviderNotEligible(_)));

        let visible = emergencies
            .list_nearby_pending_for_provider(hospital.id)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].emergency.id, emergency.id);
        assert_eq!(visible[0].user.as_ref().map(|u| u.id), Some(user.id));
        assert!(visible[0].distance_m.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn second_hospital_cannot_take_an_accepted_emergency() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let first = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let second = seed_provider(&store, "Metro Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let emergency = emergencies
            .create_emergency(user.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        emergencies.accept_emergency(first.id, emergency.id).await.unwrap();

        let err = emergencies.accept_emergency(second.id, emergency.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
        let err = emergencies.close_emergency(second.id, emergency.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));

        let closed = emergencies.close_emergency(first.id, emergency.id).await.unwrap();
        assert_eq!(closed.status, EmergencyStatus::Closed);
        assert_eq!(emergencies.list_closed_emergencies(first.id).await.unwrap().len(), 1);
        let provider = store.get_provider(first.id).await.unwrap().unwrap();
        assert_eq!(provider.service_count, 1);
    }

    #[tokio::test]
    async fn map_splits_pending_and_accepted() {
        let store = Arc::new(MemoryStore::new());
        let asha = seed_user(&store, "asha@example.com", "9876543210").await;
        let ravi = seed_user(&store, "ravi@example.com", "9876543211").await;
        let hospital = seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let emergencies = service(&store, Arc::new(RecordingNotifier::default()));

        let taken = emergencies
            .create_emergency(asha.id, BANGALORE.0, BANGALORE.1)
            .await
            .unwrap();
        emergencies
            .create_emergency(ravi.id, 77.62, 12.95)
            .await
            .unwrap();
        emergencies.accept_emergency(hospital.id, taken.id).await.unwrap();

        let map = emergencies.emergency_map(hospital.id).await.unwrap();
        assert_eq!(map.provider.id, hospital.id);
        assert_eq!(map.pending.len(), 1);
        assert_eq!(map.accepted.len(), 1);
        assert_eq!(map.accepted[0].emergency.id, taken.id);

        let mine = emergencies.list_my_emergencies(asha.id).await.unwrap();
        assert_eq!(mine[0].provider.as_ref().map(|p| p.id), Some(hospital.id));
    }
}
