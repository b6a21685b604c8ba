// service/matching_service.rs
use std::{collections::HashMap, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Store,
    geo::{validate_distance, GeoPoint},
    models::{
        emergencymodel::EmergencyStatus,
        providermodel::*,
        requestmodel::*,
        usermodel::User,
    },
    service::error::ServiceError,
};

/// Who is looking at a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    User(Uuid),
    Provider(Uuid),
    Admin,
}

#[derive(Debug, Clone)]
pub struct VehicleDraft {
    pub vehicle_type: String,
    pub number: String,
    pub name: String,
}

impl VehicleDraft {
    fn parse(self) -> Result<VehicleInfo, ServiceError> {
        let vehicle_type =
            VehicleType::from_str(&self.vehicle_type).map_err(ServiceError::Validation)?;
        Ok(VehicleInfo {
            vehicle_type,
            number: self.number,
            name: self.name,
        })
    }
}

/// Unvalidated input for a new service request.
#[derive(Debug, Clone)]
pub struct ServiceRequestDraft {
    pub longitude: f64,
    pub latitude: f64,
    pub title: String,
    pub describe_problem: String,
    pub vehicle: VehicleDraft,
    pub advance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRequestEdit {
    pub describe_problem: Option<String>,
    pub vehicle: Option<VehicleDraft>,
    pub advance: Option<f64>,
}

/// A request together with its candidate providers, nearest first.
#[derive(Debug, Clone)]
pub struct RequestWithCandidates {
    pub request: ServiceRequest,
    pub candidates: Vec<NearbyProvider>,
}

#[derive(Debug, Clone)]
pub struct ProviderRequestView {
    pub request: ServiceRequest,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRequestGroups {
    pub pending: Vec<ProviderRequestView>,
    pub accepted: Vec<ProviderRequestView>,
    pub closed: Vec<ProviderRequestView>,
}

#[derive(Debug, Clone)]
pub struct RequestMap {
    pub request: ServiceRequest,
    pub user: Option<User>,
    pub providers: Vec<ServiceProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Emergency,
    ServiceRequest,
}

#[derive(Debug, Clone)]
pub struct NearbyActivity {
    pub kind: ActivityKind,
    pub id: Uuid,
    pub title: Option<RequestTitle>,
    pub point: GeoPoint,
    pub distance_m: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MatchingService {
    db_client: Arc<dyn Store>,
    radius_m: f64,
    activity_radius_m: f64,
}

fn validate_advance(advance: f64) -> Result<f64, ServiceError> {
    if !advance.is_finite() || advance < 0.0 {
        return Err(ServiceError::Validation(
            "Advance must be a non-negative amount".to_string(),
        ));
    }
    Ok(advance)
}

impl MatchingService {
    pub fn new(db_client: Arc<dyn Store>, radius_m: f64, activity_radius_m: f64) -> Self {
        Self {
            db_client,
            radius_m,
            activity_radius_m,
        }
    }

    async fn load_request(&self, request_id: Uuid) -> Result<ServiceRequest, ServiceError> {
        self.db_client
            .get_service_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))
    }

    /// Distance-ordered candidate details for a stored request.
    async fn candidates_of(&self, request: &ServiceRequest) -> Result<Vec<NearbyProvider>, ServiceError> {
        let providers = self
            .db_client
            .get_providers_by_ids(&request.candidate_providers)
            .await?;
        Ok(with_distances(request, providers))
    }

    pub async fn create_service_request(
        &self,
        user_id: Uuid,
        draft: ServiceRequestDraft,
    ) -> Result<RequestWithCandidates, ServiceError> {
        // All input checks happen before anything is read or written.
        let point = GeoPoint::new(draft.longitude, draft.latitude)?;
        let title = RequestTitle::from_str(&draft.title).map_err(ServiceError::Validation)?;
        let vehicle_info = draft.vehicle.parse()?;
        let advance = validate_advance(draft.advance)?;

        self.db_client
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let candidates = self
            .db_client
            .find_nearby_providers(point, self.radius_m, Some(ProviderType::Mechanical))
            .await?;

        let request = self
            .db_client
            .save_service_request(NewServiceRequest {
                user_id,
                point,
                title,
                describe_problem: draft.describe_problem,
                vehicle_info,
                candidate_providers: candidates.iter().map(|c| c.provider.id).collect(),
                advance,
            })
            .await?;

        tracing::info!(
            "Service request {} created by user {} with {} candidate providers",
            request.id,
            user_id,
            candidates.len()
        );

        Ok(RequestWithCandidates {
            request,
            candidates,
        })
    }

    pub async fn list_my_service_requests(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RequestWithCandidates>, ServiceError> {
        let requests = self.db_client.get_service_requests_by_user(user_id).await?;

        let mut ids: Vec<Uuid> = requests
            .iter()
            .flat_map(|r| r.candidate_providers.iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let providers: HashMap<Uuid, ServiceProvider> = self
            .db_client
            .get_providers_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(requests
            .into_iter()
            .map(|request| {
                let own: Vec<ServiceProvider> = request
                    .candidate_providers
                    .iter()
                    .filter_map(|id| providers.get(id).cloned())
                    .collect();
                let candidates = with_distances(&request, own);
                RequestWithCandidates {
                    request,
                    candidates,
                }
            })
            .collect())
    }

    pub async fn get_service_request(
        &self,
        viewer: Viewer,
        request_id: Uuid,
    ) -> Result<RequestWithCandidates, ServiceError> {
        let request = self.load_request(request_id).await?;

        match viewer {
            Viewer::Admin => {}
            Viewer::User(user_id) if user_id == request.user_id => {}
            _ => {
                return Err(ServiceError::NotAuthorized(
                    "Not authorized to view this request".to_string(),
                ))
            }
        }

        let candidates = self.candidates_of(&request).await?;
        Ok(RequestWithCandidates {
            request,
            candidates,
        })
    }

    pub async fn update_service_request(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        edit: ServiceRequestEdit,
    ) -> Result<ServiceRequest, ServiceError> {
        let update = ServiceRequestUpdate {
            describe_problem: edit.describe_problem,
            vehicle_info: edit.vehicle.map(VehicleDraft::parse).transpose()?,
            advance: edit.advance.map(validate_advance).transpose()?,
        };

        if let Some(request) = self
            .db_client
            .update_pending_service_request(request_id, user_id, update)
            .await?
        {
            return Ok(request);
        }

        let current = self.load_request(request_id).await?;
        if current.user_id != user_id {
            return Err(ServiceError::NotAuthorized(
                "Not authorized to update this request".to_string(),
            ));
        }
        Err(ServiceError::invalid_transition(
            "update request",
            current.status.to_str(),
        ))
    }

    /// First half of the two-step assignment: the owner picks one of the
    /// candidates. The request stays pending until that provider accepts.
    pub async fn user_select_provider(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<ServiceRequest, ServiceError> {
        if let Some(request) = self
            .db_client
            .select_provider(request_id, user_id, provider_id)
            .await?
        {
            tracing::info!(
                "User {} selected provider {} for request {}",
                user_id,
                provider_id,
                request_id
            );
            return Ok(request);
        }

        let current = self.load_request(request_id).await?;
        if current.user_id != user_id {
            return Err(ServiceError::NotAuthorized(
                "Not authorized to update this request".to_string(),
            ));
        }
        if current.status != RequestStatus::Pending {
            return Err(ServiceError::invalid_transition(
                "select provider",
                current.status.to_str(),
            ));
        }
        Err(ServiceError::ProviderNotEligible(
            "Selected provider is not available for this request".to_string(),
        ))
    }

    pub async fn provider_accept_request(
        &self,
        provider_id: Uuid,
        request_id: Uuid,
    ) -> Result<ServiceRequest, ServiceError> {
        if let Some(request) = self
            .db_client
            .accept_service_request(request_id, provider_id)
            .await?
        {
            tracing::info!("Provider {} accepted request {}", provider_id, request_id);
            return Ok(request);
        }

        let current = self.load_request(request_id).await?;
        match current.status {
            RequestStatus::Pending => Err(ServiceError::ProviderNotEligible(
                "You are not available for this request".to_string(),
            )),
            RequestStatus::Accepted if current.selected_provider != Some(provider_id) => {
                Err(ServiceError::AlreadyAccepted(request_id))
            }
            status => Err(ServiceError::invalid_transition(
                "accept request",
                status.to_str(),
            )),
        }
    }

    pub async fn complete_request(
        &self,
        provider_id: Uuid,
        request_id: Uuid,
    ) -> Result<ServiceRequest, ServiceError> {
        if let Some(request) = self
            .db_client
            .complete_service_request(request_id, provider_id)
            .await?
        {
            if let Err(e) = self.db_client.increment_service_count(provider_id).await {
                tracing::warn!(
                    "Failed to bump service count of provider {}: {}",
                    provider_id,
                    e
                );
            }
            tracing::info!("Provider {} completed request {}", provider_id, request_id);
            return Ok(request);
        }

        let current = self.load_request(request_id).await?;
        if current.selected_provider != Some(provider_id) {
            return Err(ServiceError::NotAuthorized(
                "Not authorized to complete this request".to_string(),
            ));
        }
        Err(ServiceError::invalid_transition(
            "complete request",
            current.status.to_str(),
        ))
    }

    pub async fn cancel_request(&self, user_id: Uuid, request_id: Uuid) -> Result<(), ServiceError> {
        if self
            .db_client
            .delete_pending_service_request(request_id, user_id)
            .await?
        {
            tracing::info!("User {} cancelled request {}", user_id, request_id);
            return Ok(());
        }

        let current = self.load_request(request_id).await?;
        if current.user_id != user_id {
            return Err(ServiceError::NotAuthorized(
                "Not authorized to cancel this request".to_string(),
            ));
        }
        Err(ServiceError::invalid_transition(
            "cancel request",
            current.status.to_str(),
        ))
    }

    async fn with_owners(
        &self,
        requests: Vec<ServiceRequest>,
    ) -> Result<Vec<ProviderRequestView>, ServiceError> {
        let mut users: HashMap<Uuid, Option<User>> = HashMap::new();
        let mut views = Vec::with_capacity(requests.len());

        for request in requests {
            let user = match users.get(&request.user_id) {
                Some(user) => user.clone(),
                None => {
                    let user = self.db_client.get_user(request.user_id).await?;
                    users.insert(request.user_id, user.clone());
                    user
                }
            };
            views.push(ProviderRequestView { request, user });
        }

        Ok(views)
    }

    /// Requests where the caller is the selected provider, grouped by status.
    pub async fn list_provider_requests(
        &self,
        provider_id: Uuid,
    ) -> Result<ProviderRequestGroups, ServiceError> {
        let requests = self
            .db_client
            .get_service_requests_for_provider(provider_id, None)
            .await?;

        let mut groups = ProviderRequestGroups::default();
        for view in self.with_owners(requests).await? {
            match view.request.status {
                RequestStatus::Pending => groups.pending.push(view),
                RequestStatus::Accepted => groups.accepted.push(view),
                RequestStatus::Closed => groups.closed.push(view),
            }
        }
        Ok(groups)
    }

    pub async fn list_accepted_requests(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<ProviderRequestView>, ServiceError> {
        let requests = self
            .db_client
            .get_service_requests_for_provider(provider_id, Some(RequestStatus::Accepted))
            .await?;
        self.with_owners(requests).await
    }

    /// Owner, admin, or any candidate provider may open the map.
    pub async fn request_map(
        &self,
        viewer: Viewer,
        request_id: Uuid,
    ) -> Result<RequestMap, ServiceError> {
        let request = self.load_request(request_id).await?;

        let allowed = match viewer {
            Viewer::Admin => true,
            Viewer::User(user_id) => user_id == request.user_id,
            Viewer::Provider(provider_id) => request.is_candidate(provider_id),
        };
        if !allowed {
            return Err(ServiceError::NotAuthorized(
                "Not authorized to view this request".to_string(),
            ));
        }

        let user = self.db_client.get_user(request.user_id).await?;
        let providers = self
            .db_client
            .get_providers_by_ids(&request.candidate_providers)
            .await?;

        Ok(RequestMap {
            request,
            user,
            providers,
        })
    }

    /// Pending emergencies and pending service requests around a point.
    pub async fn nearby_pending_activity(
        &self,
        point: GeoPoint,
    ) -> Result<Vec<NearbyActivity>, ServiceError> {
        let radius = validate_distance(self.activity_radius_m)?;

        let emergencies = self
            .db_client
            .find_nearby_emergencies(point, radius, &[EmergencyStatus::Pending])
            .await?;
        let requests = self
            .db_client
            .find_nearby_pending_service_requests(point, radius)
            .await?;

        let mut activity: Vec<NearbyActivity> = emergencies
            .into_iter()
            .filter_map(|nearby| {
                let e = nearby.emergency;
                Some(NearbyActivity {
                    kind: ActivityKind::Emergency,
                    id: e.id,
                    title: None,
                    point: e.point().ok()?,
                    distance_m: nearby.distance_m,
                    created_at: e.created_at,
                })
            })
            .chain(requests.into_iter().filter_map(|nearby| {
                let r = nearby.request;
                Some(NearbyActivity {
                    kind: ActivityKind::ServiceRequest,
                    id: r.id,
                    title: Some(r.title),
                    point: r.point().ok()?,
                    distance_m: nearby.distance_m,
                    created_at: r.created_at,
                })
            }))
            .collect();

        activity.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(activity)
    }
}

fn with_distances(request: &ServiceRequest, providers: Vec<ServiceProvider>) -> Vec<NearbyProvider> {
    let origin = request.point().ok();

    let mut nearby: Vec<NearbyProvider> = providers
        .into_iter()
        .map(|provider| {
            let distance_m = match (origin, provider.point().ok()) {
                (Some(a), Some(b)) => a.distance_to(&b),
                _ => f64::MAX,
            };
            NearbyProvider {
                provider,
                distance_m,
            }
        })
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::*;

    const BANGALORE: (f64, f64) = (77.5946, 12.9716);

    fn draft() -> ServiceRequestDraft {
        ServiceRequestDraft {
            longitude: BANGALORE.0,
            latitude: BANGALORE.1,
            title: "Flat-Tyre".to_string(),
            describe_problem: "Rear tyre punctured".to_string(),
            vehicle: VehicleDraft {
                vehicle_type: "car".to_string(),
                number: "KA01AB1234".to_string(),
                name: "Swift".to_string(),
            },
            advance: 200.0,
        }
    }

    fn service(store: &Arc<MemoryStore>) -> MatchingService {
        MatchingService::new(store.clone(), 10_000.0, 50_000.0)
    }

    #[tokio::test]
    async fn candidates_follow_provider_location() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        assert_eq!(created.request.status, RequestStatus::Pending);
        assert_eq!(created.request.selected_provider, None);
        assert_eq!(created.request.candidate_providers, vec![garage.id]);
        assert_eq!(created.candidates.len(), 1);
        assert!(created.candidates[0].distance_m < 1.0);

        move_provider(&store, garage.id, (0.0, 0.0)).await;

        let again = matching.create_service_request(user.id, draft()).await.unwrap();
        assert!(again.request.candidate_providers.is_empty());
        assert!(again.candidates.is_empty());
    }

    #[tokio::test]
    async fn hospitals_and_unavailable_mechanics_are_not_candidates() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        seed_provider(&store, "City Hospital", ProviderType::Hospital, BANGALORE).await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        set_available(&store, garage.id, false).await;

        let created = service(&store)
            .create_service_request(user.id, draft())
            .await
            .unwrap();
        assert!(created.request.candidate_providers.is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let matching = service(&store);

        let mut bad_title = draft();
        bad_title.title = "Roadside Assistance".to_string();
        let mut bad_vehicle = draft();
        bad_vehicle.vehicle.vehicle_type = "truck".to_string();
        let mut bad_point = draft();
        bad_point.latitude = 123.0;

        for input in [bad_title, bad_vehicle, bad_point] {
            let err = matching
                .create_service_request(user.id, input)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation_error");
        }

        assert!(matching.list_my_service_requests(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn selecting_a_non_candidate_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let outsider = seed_provider(&store, "Far Garage", ProviderType::Mechanical, (0.0, 0.0)).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        let err = matching
            .user_select_provider(user.id, created.request.id, outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ProviderNotEligible(_)));

        let stored = store
            .get_service_request(created.request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.selected_provider, None);
    }

    #[tokio::test]
    async fn selection_keeps_request_pending_until_provider_accepts() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        let selected = matching
            .user_select_provider(user.id, created.request.id, garage.id)
            .await
            .unwrap();
        assert_eq!(selected.status, RequestStatus::Pending);
        assert_eq!(selected.selected_provider, Some(garage.id));

        let groups = matching.list_provider_requests(garage.id).await.unwrap();
        assert_eq!(groups.pending.len(), 1);
        assert_eq!(groups.pending[0].user.as_ref().map(|u| u.id), Some(user.id));

        let accepted = matching
            .provider_accept_request(garage.id, created.request.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);

        let err = matching
            .user_select_provider(user.id, created.request.id, garage.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state_transition");
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let first = seed_provider(&store, "Garage One", ProviderType::Mechanical, BANGALORE).await;
        let second = seed_provider(&store, "Garage Two", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        let request_id = created.request.id;

        let a = {
            let matching = matching.clone();
            tokio::spawn(async move { matching.provider_accept_request(first.id, request_id).await })
        };
        let b = {
            let matching = matching.clone();
            tokio::spawn(async move { matching.provider_accept_request(second.id, request_id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<&ServiceRequest> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(loser, ServiceError::AlreadyAccepted(id) if *id == request_id));

        let stored = store.get_service_request(request_id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
        assert_eq!(stored.selected_provider, winners[0].selected_provider);
    }

    #[tokio::test]
    async fn completing_twice_is_an_invalid_transition_both_times() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        let id = created.request.id;
        matching.provider_accept_request(garage.id, id).await.unwrap();

        let closed = matching.complete_request(garage.id, id).await.unwrap();
        assert_eq!(closed.status, RequestStatus::Closed);

        for _ in 0..2 {
            let err = matching.complete_request(garage.id, id).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
        }

        let stored = store.get_service_request(id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Closed);
        let provider = store.get_provider(garage.id).await.unwrap().unwrap();
        assert_eq!(provider.service_count, 1);
    }

    #[tokio::test]
    async fn only_the_selected_provider_completes() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let other = seed_provider(&store, "Other Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        matching
            .provider_accept_request(garage.id, created.request.id)
            .await
            .unwrap();

        let err = matching
            .complete_request(other.id, created.request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn cancel_only_while_pending() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let stranger = seed_user(&store, "ravi@example.com", "9876543211").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let pending = matching.create_service_request(user.id, draft()).await.unwrap();
        let err = matching
            .cancel_request(stranger.id, pending.request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));

        matching.cancel_request(user.id, pending.request.id).await.unwrap();
        let err = matching
            .get_service_request(Viewer::User(user.id), pending.request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RequestNotFound(_)));

        let accepted = matching.create_service_request(user.id, draft()).await.unwrap();
        matching
            .provider_accept_request(garage.id, accepted.request.id)
            .await
            .unwrap();
        let err = matching
            .cancel_request(user.id, accepted.request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
        assert!(store
            .get_service_request(accepted.request.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn edits_are_limited_to_pending_requests() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();
        let edited = matching
            .update_service_request(
                user.id,
                created.request.id,
                ServiceRequestEdit {
                    describe_problem: Some("Both tyres flat".to_string()),
                    advance: Some(500.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.describe_problem, "Both tyres flat");
        assert_eq!(edited.advance, 500.0);
        assert_eq!(edited.vehicle_number, "KA01AB1234");

        matching
            .provider_accept_request(garage.id, created.request.id)
            .await
            .unwrap();
        let err = matching
            .update_service_request(
                user.id,
                created.request.id,
                ServiceRequestEdit {
                    advance: Some(10.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn request_map_is_visible_to_candidates_only() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let garage = seed_provider(&store, "Garage", ProviderType::Mechanical, BANGALORE).await;
        let far = seed_provider(&store, "Far Garage", ProviderType::Mechanical, (0.0, 0.0)).await;
        let matching = service(&store);

        let created = matching.create_service_request(user.id, draft()).await.unwrap();

        let map = matching
            .request_map(Viewer::Provider(garage.id), created.request.id)
            .await
            .unwrap();
        assert_eq!(map.providers.len(), 1);
        assert_eq!(map.user.map(|u| u.id), Some(user.id));

        let err = matching
            .request_map(Viewer::Provider(far.id), created.request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn nearby_activity_lists_pending_work_of_both_kinds() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "asha@example.com", "9876543210").await;
        let other = seed_user(&store, "ravi@example.com", "9876543211").await;
        let matching = service(&store);

        matching.create_service_request(user.id, draft()).await.unwrap();
        store
            .create_emergency(other.id, GeoPoint::new(77.60, 12.98).unwrap())
            .await
            .unwrap();
        store
            .create_emergency(Uuid::new_v4(), GeoPoint::new(0.0, 0.0).unwrap())
            .await
            .unwrap();

        let here = GeoPoint::new(BANGALORE.0, BANGALORE.1).unwrap();
        let activity = matching.nearby_pending_activity(here).await.unwrap();

        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].kind, ActivityKind::ServiceRequest);
        assert_eq!(activity[1].kind, ActivityKind::Emergency);
        assert!(activity[0].distance_m <= activity[1].distance_m);
    }
}
