use async_trait::async_trait;
use uuid::Uuid;

use super::{DBClient, HAVERSINE_SQL};
use crate::{
    geo::{BoundingBox, GeoPoint},
    models::emergencymodel::*,
};

#[async_trait]
pub trait EmergencyExt {
    /// Inserts a pending emergency unless the user already has an active one,
    /// in which case `Ok(None)` is returned and nothing is written.
    async fn create_emergency(
        &self,
        user_id: Uuid,
        point: GeoPoint,
    ) -> Result<Option<Emergency>, sqlx::Error>;

    async fn get_emergency(&self, emergency_id: Uuid) -> Result<Option<Emergency>, sqlx::Error>;

    async fn get_emergencies_by_user(&self, user_id: Uuid) -> Result<Vec<Emergency>, sqlx::Error>;

    async fn get_emergencies_for_provider(
        &self,
        provider_id: Uuid,
        status: EmergencyStatus,
    ) -> Result<Vec<Emergency>, sqlx::Error>;

    /// pending -> accepted, assigning `provider_id`.
    async fn accept_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error>;

    /// accepted + assigned to `provider_id` -> closed.
    async fn close_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error>;

    /// Hard-deletes a pending emergency owned by `user_id`.
    async fn delete_pending_emergency(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>;

    /// accepted + owned by `user_id` -> deleted_by_user.
    async fn mark_emergency_deleted_by_user(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error>;

    async fn find_nearby_emergencies(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        statuses: &[EmergencyStatus],
    ) -> Result<Vec<NearbyEmergency>, sqlx::Error>;
}

#[async_trait]
impl EmergencyExt for DBClient {
    async fn create_emergency(
        &self,
        user_id: Uuid,
        point: GeoPoint,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        // The partial unique index closes the race between two concurrent creations.
        sqlx::query_as::<_, Emergency>(
            r#"
            INSERT INTO emergencies (user_id, longitude, latitude, status)
            VALUES ($1, $2, $3, 'pending')
            ON CONFLICT (user_id) WHERE status IN ('pending', 'accepted') DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(point.longitude())
        .bind(point.latitude())
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_emergency(&self, emergency_id: Uuid) -> Result<Option<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(r#"SELECT * FROM emergencies WHERE id = $1"#)
            .bind(emergency_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_emergencies_by_user(&self, user_id: Uuid) -> Result<Vec<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(
            r#"
            SELECT * FROM emergencies
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_emergencies_for_provider(
        &self,
        provider_id: Uuid,
        status: EmergencyStatus,
    ) -> Result<Vec<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(
            r#"
            SELECT * FROM emergencies
            WHERE service_provider = $1 AND status = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(provider_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
    }

    async fn accept_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(
            r#"
            UPDATE emergencies
            SET status = 'accepted', service_provider = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(emergency_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn close_emergency(
        &self,
        emergency_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(
            r#"
            UPDATE emergencies
            SET status = 'closed', updated_at = NOW()
            WHERE id = $1 AND status = 'accepted' AND service_provider = $2
            RETURNING *
            "#,
        )
        .bind(emergency_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_pending_emergency(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM emergencies
            WHERE id = $1 AND user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(emergency_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_emergency_deleted_by_user(
        &self,
        emergency_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Emergency>, sqlx::Error> {
        sqlx::query_as::<_, Emergency>(
            r#"
            UPDATE emergencies
            SET status = 'deleted_by_user', updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'accepted'
            RETURNING *
            "#,
        )
        .bind(emergency_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_nearby_emergencies(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        statuses: &[EmergencyStatus],
    ) -> Result<Vec<NearbyEmergency>, sqlx::Error> {
        if statuses.is_empty() {
            return Ok(vec![]);
        }

        let bbox = BoundingBox::around(&point, max_distance_m);

        let query = format!(
            r#"
            SELECT * FROM (
                SELECT e.*, {HAVERSINE_SQL} AS distance_m
                FROM emergencies e
                WHERE status = ANY($3)
                  AND latitude BETWEEN $4 AND $5
                  AND longitude BETWEEN $6 AND $7
            ) nearby
            WHERE distance_m <= $8
            ORDER BY distance_m ASC
            "#
        );

        sqlx::query_as::<_, NearbyEmergency>(&query)
            .bind(point.longitude())
            .bind(point.latitude())
            .bind(statuses)
            .bind(bbox.min_latitude)
            .bind(bbox.max_latitude)
            .bind(bbox.min_longitude)
            .bind(bbox.max_longitude)
            .bind(max_distance_m)
            .fetch_all(&self.pool)
            .await
    }
}
