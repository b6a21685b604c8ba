use async_trait::async_trait;
use uuid::Uuid;

use super::{DBClient, HAVERSINE_SQL};
use crate::{
    geo::{BoundingBox, GeoPoint},
    models::requestmodel::*,
};

/// Persistence for service requests.
///
/// Every status-changing method is a single conditional write: it returns
/// `Ok(None)` when the record is missing or its current state does not
/// satisfy the guard, and never overwrites a state it did not expect.
#[async_trait]
pub trait ServiceRequestExt {
    async fn save_service_request(
        &self,
        new_request: NewServiceRequest,
    ) -> Result<ServiceRequest, sqlx::Error>;

    async fn get_service_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, sqlx::Error>;

    async fn get_service_requests_by_user(&self, user_id: Uuid) -> Result<Vec<ServiceRequest>, sqlx::Error>;

    /// Requests whose selected provider is `provider_id`, newest first.
    async fn get_service_requests_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, sqlx::Error>;

    /// pending + owned by `user_id` + `provider_id` in the candidate set.
    /// Sets `selected_provider`, status stays pending.
    async fn select_provider(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error>;

    /// pending + `provider_id` in the candidate set -> accepted.
    async fn accept_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error>;

    /// accepted + selected provider is `provider_id` -> closed.
    async fn complete_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error>;

    /// Edits a pending request owned by `user_id`.
    async fn update_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        update: ServiceRequestUpdate,
    ) -> Result<Option<ServiceRequest>, sqlx::Error>;

    /// Removes a pending request owned by `user_id`. `false` when the guard failed.
    async fn delete_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    async fn find_nearby_pending_service_requests(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
    ) -> Result<Vec<NearbyServiceRequest>, sqlx::Error>;
}

#[async_trait]
impl ServiceRequestExt for DBClient {
    async fn save_service_request(
        &self,
        new_request: NewServiceRequest,
    ) -> Result<ServiceRequest, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            INSERT INTO service_requests
            (user_id, longitude, latitude, title, describe_problem,
             vehicle_type, vehicle_number, vehicle_name, candidate_providers, advance)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new_request.user_id)
        .bind(new_request.point.longitude())
        .bind(new_request.point.latitude())
        .bind(new_request.title)
        .bind(&new_request.describe_problem)
        .bind(new_request.vehicle_info.vehicle_type)
        .bind(&new_request.vehicle_info.number)
        .bind(&new_request.vehicle_info.name)
        .bind(&new_request.candidate_providers)
        .bind(new_request.advance)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_service_request(&self, request_id: Uuid) -> Result<Option<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(r#"SELECT * FROM service_requests WHERE id = $1"#)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_service_requests_by_user(&self, user_id: Uuid) -> Result<Vec<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            SELECT * FROM service_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_service_requests_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            SELECT * FROM service_requests
            WHERE selected_provider = $1
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(provider_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
    }

    async fn select_provider(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET selected_provider = $3, updated_at = NOW()
            WHERE id = $1
              AND user_id = $2
              AND status = 'pending'
              AND $3 = ANY(candidate_providers)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn accept_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET selected_provider = $2, status = 'accepted', updated_at = NOW()
            WHERE id = $1
              AND status = 'pending'
              AND $2 = ANY(candidate_providers)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn complete_service_request(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET status = 'closed', updated_at = NOW()
            WHERE id = $1
              AND status = 'accepted'
              AND selected_provider = $2
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
        update: ServiceRequestUpdate,
    ) -> Result<Option<ServiceRequest>, sqlx::Error> {
        let vehicle = update.vehicle_info;

        sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET describe_problem = COALESCE($3, describe_problem),
                vehicle_type = COALESCE($4, vehicle_type),
                vehicle_number = COALESCE($5, vehicle_number),
                vehicle_name = COALESCE($6, vehicle_name),
                advance = COALESCE($7, advance),
                updated_at = NOW()
            WHERE id = $1
              AND user_id = $2
              AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .bind(update.describe_problem)
        .bind(vehicle.as_ref().map(|v| v.vehicle_type))
        .bind(vehicle.as_ref().map(|v| v.number.clone()))
        .bind(vehicle.as_ref().map(|v| v.name.clone()))
        .bind(update.advance)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_pending_service_request(
        &self,
        request_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM service_requests
            WHERE id = $1 AND user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_nearby_pending_service_requests(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
    ) -> Result<Vec<NearbyServiceRequest>, sqlx::Error> {
        let bbox = BoundingBox::around(&point, max_distance_m);

        let query = format!(
            r#"
            SELECT * FROM (
                SELECT r.*, {HAVERSINE_SQL} AS distance_m
                FROM service_requests r
                WHERE status = 'pending'
                  AND latitude BETWEEN $3 AND $4
                  AND longitude BETWEEN $5 AND $6
            ) nearby
            WHERE distance_m <= $7
            ORDER BY distance_m ASC
            "#
        );

        sqlx::query_as::<_, NearbyServiceRequest>(&query)
            .bind(point.longitude())
            .bind(point.latitude())
            .bind(bbox.min_latitude)
            .bind(bbox.max_latitude)
            .bind(bbox.min_longitude)
            .bind(bbox.max_longitude)
            .bind(max_distance_m)
            .fetch_all(&self.pool)
            .await
    }
}
