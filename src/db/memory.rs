//! In-memory [`Store`] used when no database is configured and by the test suite.
//!
//! All records live behind one `RwLock`. Every conditional transition checks
//! its guard and writes the new state under a single write guard, so two
//! concurrent callers can never both observe the old state.

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EmergencyExt, ProviderExt, ServiceRequestExt, Store, UserExt};
use crate::{
    geo::{GeoIndex, GeoPoint},
    models::{emergencymodel::*, providermodel::*, requestmodel::*, usermodel::*},
};

/// Unique-constraint failure raised by the memory store, shaped like the
/// Postgres one so callers can rely on `is_unique_violation()` for both.
#[derive(Debug, Error)]
#[error("duplicate key value violates unique constraint \"{constraint}\"")]
pub struct UniqueViolation {
    constraint: &'static str,
}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    credentials: HashMap<String, Credential>,
    providers: HashMap<Uuid, ServiceProvider>,
    provider_index: GeoIndex,
    requests: HashMap<Uuid, ServiceRequest>,
    // only pending requests are indexed
    pending_request_index: GeoIndex,
    emergencies: HashMap<Uuid, Emergency>,
    emergency_index: GeoIndex,
}

impl MemoryState {
    fn mobile_taken(&self, mobile: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.mobile == mobile && Some(u.id) != except)
    }

    fn active_emergency_of(&self, user_id: Uuid) -> Option<&Emergency> {
        self.emergencies
            .values()
            .find(|e| e.user_id == user_id && e.status.is_active())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl UserExt for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.mobile == mobile).cloned())
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User, sqlx::Error> {
        let mut state = self.state.write().await;

        if state.credentials.contains_key(&new_user.email) {
            return Err(unique_violation("credentials_pkey"));
        }
        if state.mobile_taken(&new_user.mobile, None) {
            return Err(unique_violation("users_mobile_key"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            mobile: new_user.mobile,
            state: new_user.location.state,
            district: new_user.location.district,
            city: new_user.location.city,
            longitude: new_user.point.longitude(),
            latitude: new_user.point.latitude(),
            guardian_emails: vec![],
            other_contact: new_user.other_contact,
            created_at: now,
            updated_at: now,
        };

        state.credentials.insert(
            user.email.clone(),
            Credential {
                email: user.email.clone(),
                role: UserRole::User,
                subject_id: user.id,
                password: new_user.password_hash,
                created_at: now,
            },
        );
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut state = self.state.write().await;

        if let Some(mobile) = &update.mobile {
            if state.mobile_taken(mobile, Some(user_id)) {
                return Err(unique_violation("users_mobile_key"));
            }
        }

        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(mobile) = update.mobile {
            user.mobile = mobile;
        }
        if let Some(location) = update.location {
            user.state = location.state;
            user.district = location.district;
            user.city = location.city;
        }
        if let Some(other_contact) = update.other_contact {
            user.other_contact = other_contact;
        }
        if let Some(guardian_emails) = update.guardian_emails {
            user.guardian_emails = guardian_emails;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn update_guardian_emails(
        &self,
        user_id: Uuid,
        guardian_emails: Vec<String>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut state = self.state.write().await;
        Ok(state.users.get_mut(&user_id).map(|user| {
            user.guardian_emails = guardian_emails;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn get_credential(&self, email: &str) -> Result<Option<Credential>, sqlx::Error> {
        Ok(self.state.read().await.credentials.get(email).cloned())
    }

    async fn save_admin_credential(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Credential, sqlx::Error> {
        let mut state = self.state.write().await;

        match state.credentials.get_mut(email) {
            Some(existing) if existing.role == UserRole::Admin => {
                existing.password = password_hash.to_string();
                Ok(existing.clone())
            }
            Some(_) => Err(unique_violation("credentials_pkey")),
            None => {
                let credential = Credential {
                    email: email.to_string(),
                    role: UserRole::Admin,
                    subject_id: Uuid::new_v4(),
                    password: password_hash.to_string(),
                    created_at: Utc::now(),
                };
                state.credentials.insert(email.to_string(), credential.clone());
                Ok(credential)
            }
        }
    }
}

#[async_trait]
impl ProviderExt for MemoryStore {
    async fn save_provider(
        &self,
        new_provider: NewServiceProvider,
    ) -> Result<ServiceProvider, sqlx::Error> {
        let mut state = self.state.write().await;

        if state.credentials.contains_key(&new_provider.email) {
            return Err(unique_violation("credentials_pkey"));
        }
        if state.providers.values().any(|p| p.name == new_provider.name) {
            return Err(unique_violation("service_providers_name_key"));
        }

        let now = Utc::now();
        let provider = ServiceProvider {
            id: Uuid::new_v4(),
            provider_type: new_provider.provider_type,
            name: new_provider.name,
            password: new_provider.password_hash.clone(),
            mobile: new_provider.mobile,
            email: new_provider.email,
            state: new_provider.location.state,
            district: new_provider.location.district,
            city: new_provider.location.city,
            longitude: new_provider.point.longitude(),
            latitude: new_provider.point.latitude(),
            is_available: true,
            rating: 0.0,
            service_count: 0,
            created_at: now,
            updated_at: now,
        };

        state.credentials.insert(
            provider.email.clone(),
            Credential {
                email: provider.email.clone(),
                role: UserRole::ServiceProvider,
                subject_id: provider.id,
                password: new_provider.password_hash,
                created_at: now,
            },
        );
        state.provider_index.insert(provider.id, new_provider.point);
        state.providers.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<ServiceProvider>, sqlx::Error> {
        Ok(self.state.read().await.providers.get(&provider_id).cloned())
    }

    async fn get_provider_by_name(&self, name: &str) -> Result<Option<ServiceProvider>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(state.providers.values().find(|p| p.name == name).cloned())
    }

    async fn get_providers(&self) -> Result<Vec<ServiceProvider>, sqlx::Error> {
        let providers: Vec<ServiceProvider> =
            self.state.read().await.providers.values().cloned().collect();
        Ok(newest_first(providers, |p: &ServiceProvider| p.created_at))
    }

    async fn get_providers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceProvider>, sqlx::Error> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.providers.get(id).cloned())
            .collect())
    }

    async fn update_provider(
        &self,
        provider_id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<ServiceProvider>, sqlx::Error> {
        let mut state = self.state.write().await;
        let MemoryState {
            providers,
            provider_index,
            ..
        } = &mut *state;

        let Some(provider) = providers.get_mut(&provider_id) else {
            return Ok(None);
        };

        if let Some(is_available) = update.is_available {
            provider.is_available = is_available;
        }
        if let Some(rating) = update.rating {
            provider.rating = rating;
        }
        if let Some(point) = update.point {
            provider.longitude = point.longitude();
            provider.latitude = point.latitude();
            provider_index.insert(provider_id, point);
        }
        provider.updated_at = Utc::now();

        Ok(Some(provider.clone()))
    }

    async fn increment_service_count(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<ServiceProvider>, sqlx::Error> {
        let mut state = self.state.write().await;
        Ok(state.providers.get_mut(&provider_id).map(|provider| {
            provider.service_count += 1;
            provider.updated_at = Utc::now();
            provider.clone()
        }))
    }

    async fn delete_provider(&self, provider_id: Uuid) -> Result<ProviderRemoval, sqlx::Error> {
        let mut state = self.state.write().await;

        if !state.providers.contains_key(&provider_id) {
            return Ok(ProviderRemoval::NotFound);
        }

        let assigned = Some(provider_id);
        let busy = state
            .requests
            .values()
            .any(|r| r.selected_provider == assigned && r.status == RequestStatus::Accepted)
            || state
                .emergencies
                .values()
                .any(|e| e.service_provider == assigned && e.status == EmergencyStatus::Accepted);
        if busy {
            return Ok(ProviderRemoval::HasAcceptedWork);
        }

        let Some(provider) = state.providers.remove(&provider_id) else {
            return Ok(ProviderRemoval::NotFound);
        };
        state.provider_index.remove(provider_id);
        state.credentials.remove(&provider.email);

        // ON DELETE SET NULL
        for request in state.requests.values_mut() {
            if request.selected_provider == assigned {
                request.selected_provider = None;
            }
        }
        for emergency in state.emergencies.values_mut() {
            if emergency.service_provider == assigned {
                emergency.service_provider = None;
            }
        }
        Ok(ProviderRemoval::Removed)
    }

    async fn find_nearby_providers(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        provider_type: Option<ProviderType>,
    ) -> Result<Vec<NearbyProvider>, sqlx::Error> {
        let state = self.state.read().await;

        Ok(state
            .provider_index
            .find_nearby(&point, max_distance_m)
            .into_iter()
            .filter_map(|(id, distance_m)| {
                let provider = state.providers.get(&id)?;
                let type_ok = provider_type.map_or(true, |t| provider.provider_type == t);
                (provider.is_available && type_ok).then(|| NearbyProvider {
                    provider: provider.clone(),
                    distance_m,
                })
            })
            .collect())
    }
}

#[async_trait]
impl ServiceRequestExt for MemoryStore {
    async fn save_service_request(
        &self,
        new_request: NewServiceRequest,
    ) -> Result<ServiceRequest, sqlx::Error> {
        let mut state = self.state.write().await;

        let now = Utc::now();
        let request = ServiceRequest {
            id: Uuid::new_v4(),
            user_id: new_request.user_id,
            longitude: new_request.point.longitude(),
            latitude: new_request.point.latitude(),
            title: new_request.title,
            describe_problem: new_request.describe_problem,
            vehicle_type: new_request.vehicle_info.vehicle_type,
            vehicle_number: new_request.vehicle_info.number,
            vehicle_name: new_request.vehicle_info.name,
            status: RequestStatus::Pending,
            candidate_providers: new_request.candidate_providers,
            selected_provider: None,
            advance: new_request.advance,
            created_at: now,
            updated_at: now,
        };

        state.pending_request_index.insert(request.id, new_request.point);
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_service_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, sqlx::Error> {
        Ok(self.state.read().await.requests.get(&request_id).cloned())
    }

    async fn get_service_requests_by_user(&self, user_id: Uuid) -> Result<Vec<ServiceRequest>, sqlx::Error> {
        let state = self.state.read().await;
        let requests: Vec<ServiceRequest> = state
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(requests, |r: &ServiceRequest| r.created_at))
    }

    async fn get_service_requests_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, sqlx::Error> {
        let state = self.state.read().await;
        let requests: Vec<ServiceRequest> = state
            .requests
            .values()
            .filter(|r| r.selected_provider == Some(provider_id))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        Ok(newest_first(requests, |r: &ServiceRequest| r.created_at))
    }

    async fn select_provider(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .requests
            .get_mut(&request_id)
            .filter(|r| {
                r.user_id == user_id
                    && r.status == RequestStatus::Pending
                    && r.is_candidate(provider_id)
            })
            .map(|r| {
                r.selected_provider = Some(provider_id);
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn accept_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let mut state = self.state.write().await;

        let accepted = state
            .requests
            .get_mut(&request_id)
            .filter(|r| r.status == RequestStatus::Pending && r.is_candidate(provider_id))
            .map(|r| {
                r.selected_provider = Some(provider_id);
                r.status = RequestStatus::Accepted;
                r.updated_at = Utc::now();
                r.clone()
            });

        if accepted.is_some() {
            state.pending_request_index.remove(request_id);
        }
        Ok(accepted)
    }

    async fn complete_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .requests
            .get_mut(&request_id)
            .filter(|r| {
                r.status == RequestStatus::Accepted && r.selected_provider == Some(provider_id)
            })
            .map(|r| {
                r.status = RequestStatus::Closed;
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn update_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        update: ServiceRequestUpdate,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .requests
            .get_mut(&request_id)
            .filter(|r| r.user_id == user_id && r.status == RequestStatus::Pending)
            .map(|r| {
                if let Some(describe_problem) = update.describe_problem {
                    r.describe_problem = describe_problem;
                }
                if let Some(vehicle) = update.vehicle_info {
                    r.vehicle_type = vehicle.vehicle_type;
                    r.vehicle_number = vehicle.number;
                    r.vehicle_name = vehicle.name;
                }
                if let Some(advance) = update.advance {
                    r.advance = advance;
                }
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn delete_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.state.write().await;

        let deletable = state
            .requests
            .get(&request_id)
            .is_some_and(|r| r.user_id == user_id && r.status == RequestStatus::Pending);

        if deletable {
            state.requests.remove(&request_id);
            state.pending_request_index.remove(request_id);
        }
        Ok(deletable)
    }

    async fn find_nearby_pending_service_requests(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
    ) -> Result<Vec<NearbyServiceRequest>, sqlx::Error> {
        let state = self.state.read().await;

        Ok(state
            .pending_request_index
            .find_nearby(&point, max_distance_m)
            .into_iter()
            .filter_map(|(id, distance_m)| {
                let request = state.requests.get(&id)?;
                (request.status == RequestStatus::Pending).then(|| NearbyServiceRequest {
                    request: request.clone(),
                    distance_m,
                })
            })
            .collect())
    }
}

#[async_trait]
impl EmergencyExt for MemoryStore {
    async fn create_emergency(
        &self,
        user_id: Uuid,
        point: GeoPoint,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        let mut state = self.state.write().await;

        if state.active_emergency_of(user_id).is_some() {
            return Ok(None);
        }

        let now = Utc::now();
        let emergency = Emergency {
            id: Uuid::new_v4(),
            user_id,
            longitude: point.longitude(),
            latitude: point.latitude(),
            status: EmergencyStatus::Pending,
            service_provider: None,
            created_at: now,
            updated_at: now,
        };

        state.emergency_index.insert(emergency.id, point);
        state.emergencies.insert(emergency.id, emergency.clone());
        Ok(Some(emergency))
    }

    async fn get_emergency(&self, emergency_id: Uuid) -> Result<Option<Emergency>, sqlx::Error> {
        Ok(self.state.read().await.emergencies.get(&emergency_id).cloned())
    }

    async fn get_emergencies_by_user(&self, user_id: Uuid) -> Result<Vec<Emergency>, sqlx::Error> {
        let state = self.state.read().await;
        let emergencies: Vec<Emergency> = state
            .emergencies
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(emergencies, |e: &Emergency| e.created_at))
    }

    async fn get_emergencies_for_provider(
        &self,
        provider_id: Uuid,
        status: EmergencyStatus,
    ) -> Result<Vec<Emergency>, sqlx::Error> {
        let state = self.state.read().await;
        let emergencies: Vec<Emergency> = state
            .emergencies
            .values()
            .filter(|e| e.service_provider == Some(provider_id) && e.status == status)
            .cloned()
            .collect();
        Ok(newest_first(emergencies, |e: &Emergency| e.created_at))
    }

    async fn accept_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .emergencies
            .get_mut(&emergency_id)
            .filter(|e| e.status == EmergencyStatus::Pending)
            .map(|e| {
                e.status = EmergencyStatus::Accepted;
                e.service_provider = Some(provider_id);
                e.updated_at = Utc::now();
                e.clone()
            }))
    }

    async fn close_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .emergencies
            .get_mut(&emergency_id)
            .filter(|e| {
                e.status == EmergencyStatus::Accepted && e.service_provider == Some(provider_id)
            })
            .map(|e| {
                e.status = EmergencyStatus::Closed;
                e.updated_at = Utc::now();
                e.clone()
            }))
    }

    async fn delete_pending_emergency(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.state.write().await;

        let deletable = state
            .emergencies
            .get(&emergency_id)
            .is_some_and(|e| e.user_id == user_id && e.status == EmergencyStatus::Pending);

        if deletable {
            state.emergencies.remove(&emergency_id);
            state.emergency_index.remove(emergency_id);
        }
        Ok(deletable)
    }

    async fn mark_emergency_deleted_by_user(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        let mut state = self.state.write().await;

        Ok(state
            .emergencies
            .get_mut(&emergency_id)
            .filter(|e| e.user_id == user_id && e.status == EmergencyStatus::Accepted)
            .map(|e| {
                e.status = EmergencyStatus::DeletedByUser;
                e.updated_at = Utc::now();
                e.clone()
            }))
    }

    async fn find_nearby_emergencies(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        statuses: &[EmergencyStatus],
    ) -> Result<Vec<NearbyEmergency>, sqlx::Error> {
        let state = self.state.read().await;

        Ok(state
            .emergency_index
            .find_nearby(&point, max_distance_m)
            .into_iter()
            .filter_map(|(id, distance_m)| {
                let emergency = state.emergencies.get(&id)?;
                statuses.contains(&emergency.status).then(|| NearbyEmergency {
                    emergency: emergency.clone(),
                    distance_m,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usermodel::Location;

    fn point(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    fn new_user(email: &str, mobile: &str) -> NewUser {
        NewUser {
            name: "Asha".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            mobile: mobile.to_string(),
            location: Location::default(),
            point: point(77.5946, 12.9716),
            other_contact: vec![],
        }
    }

    fn new_provider(name: &str, provider_type: ProviderType, at: GeoPoint) -> NewServiceProvider {
        NewServiceProvider {
            provider_type,
            name: name.to_string(),
            password_hash: "hash".to_string(),
            mobile: "9000000000".to_string(),
            email: format!("{}@providers.test", name.to_lowercase()),
            location: Location::default(),
            point: at,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        store.save_user(new_user("a@x.com", "9876543210")).await.unwrap();

        let err = store
            .save_user(new_user("a@x.com", "9876543211"))
            .await
            .unwrap_err();
        match err {
            sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn nearby_providers_respect_type_and_availability() {
        let store = MemoryStore::new();
        let here = point(77.5946, 12.9716);

        let garage = store
            .save_provider(new_provider("Garage", ProviderType::Mechanical, here))
            .await
            .unwrap();
        let hospital = store
            .save_provider(new_provider("Hospital", ProviderType::Hospital, here))
            .await
            .unwrap();

        let mechanics = store
            .find_nearby_providers(here, 10_000.0, Some(ProviderType::Mechanical))
            .await
            .unwrap();
        assert_eq!(mechanics.len(), 1);
        assert_eq!(mechanics[0].provider.id, garage.id);

        store
            .update_provider(
                hospital.id,
                ProviderUpdate {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let all = store.find_nearby_providers(here, 10_000.0, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn second_active_emergency_is_not_created() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let here = point(77.5946, 12.9716);

        assert!(store.create_emergency(user_id, here).await.unwrap().is_some());
        assert!(store.create_emergency(user_id, here).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accepted_request_leaves_pending_index() {
        let store = MemoryStore::new();
        let here = point(77.5946, 12.9716);
        let provider_id = Uuid::new_v4();

        let request = store
            .save_service_request(NewServiceRequest {
                user_id: Uuid::new_v4(),
                point: here,
                title: RequestTitle::Towing,
                describe_problem: "engine dead".to_string(),
                vehicle_info: VehicleInfo {
                    vehicle_type: VehicleType::Car,
                    number: "KA01AB1234".to_string(),
                    name: "Swift".to_string(),
                },
                candidate_providers: vec![provider_id],
                advance: 0.0,
            })
            .await
            .unwrap();

        let nearby = store
            .find_nearby_pending_service_requests(here, 1_000.0)
            .await
            .unwrap();
        assert_eq!(nearby.len(), 1);

        store
            .accept_service_request(request.id, provider_id)
            .await
            .unwrap()
            .unwrap();
        let nearby = store
            .find_nearby_pending_service_requests(here, 1_000.0)
            .await
            .unwrap();
        assert!(nearby.is_empty());
    }

    #[tokio::test]
    async fn provider_with_accepted_work_is_not_deleted() {
        let store = MemoryStore::new();
        let here = point(77.5946, 12.9716);
        let hospital = store
            .save_provider(new_provider("Hospital", ProviderType::Hospital, here))
            .await
            .unwrap();

        let emergency = store.create_emergency(Uuid::new_v4(), here).await.unwrap().unwrap();
        store
            .accept_emergency(emergency.id, hospital.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            store.delete_provider(hospital.id).await.unwrap(),
            ProviderRemoval::HasAcceptedWork
        );
        assert!(store.get_provider(hospital.id).await.unwrap().is_some());

        store
            .close_emergency(emergency.id, hospital.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            store.delete_provider(hospital.id).await.unwrap(),
            ProviderRemoval::Removed
        );
        let closed = store.get_emergency(emergency.id).await.unwrap().unwrap();
        assert_eq!(closed.service_provider, None);
        assert_eq!(
            store.delete_provider(hospital.id).await.unwrap(),
            ProviderRemoval::NotFound
        );
    }
}
