use async_trait::async_trait;
use uuid::Uuid;

use super::{DBClient, HAVERSINE_SQL};
use crate::{
    geo::{BoundingBox, GeoPoint},
    models::{providermodel::*, usermodel::UserRole},
};

#[async_trait]
pub trait ProviderExt {
    /// Inserts the provider together with its credential row.
    async fn save_provider(
        &self,
        new_provider: NewServiceProvider,
    ) -> Result<ServiceProvider, sqlx::Error>;

    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<ServiceProvider>, sqlx::Error>;

    async fn get_provider_by_name(&self, name: &str) -> Result<Option<ServiceProvider>, sqlx::Error>;

    async fn get_providers(&self) -> Result<Vec<ServiceProvider>, sqlx::Error>;

    async fn get_providers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceProvider>, sqlx::Error>;

    async fn update_provider(
        &self,
        provider_id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<ServiceProvider>, sqlx::Error>;

    async fn increment_service_count(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<ServiceProvider>, sqlx::Error>;

    /// Refuses while the provider holds an accepted request or emergency.
    async fn delete_provider(&self, provider_id: Uuid) -> Result<ProviderRemoval, sqlx::Error>;

    /// Available providers within `max_distance_m` of `point`, nearest first,
    /// optionally restricted to one provider type. No match is an empty list.
    async fn find_nearby_providers(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        provider_type: Option<ProviderType>,
    ) -> Result<Vec<NearbyProvider>, sqlx::Error>;
}

#[async_trait]
impl ProviderExt for DBClient {
    async fn save_provider(
        &self,
        new_provider: NewServiceProvider,
    ) -> Result<ServiceProvider, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let provider = sqlx::query_as::<_, ServiceProvider>(
            r#"
            INSERT INTO service_providers
            (provider_type, name, password, mobile, email, state, district, city, longitude, latitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new_provider.provider_type)
        .bind(&new_provider.name)
        .bind(&new_provider.password_hash)
        .bind(&new_provider.mobile)
        .bind(&new_provider.email)
        .bind(&new_provider.location.state)
        .bind(&new_provider.location.district)
        .bind(&new_provider.location.city)
        .bind(new_provider.point.longitude())
        .bind(new_provider.point.latitude())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credentials (email, role, subject_id, password)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&provider.email)
        .bind(UserRole::ServiceProvider)
        .bind(provider.id)
        .bind(&new_provider.password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(provider)
    }

    async fn get_provider(&self, provider_id: Uuid) -> Result<Option<ServiceProvider>, sqlx::Error> {
        sqlx::query_as::<_, ServiceProvider>(r#"SELECT * FROM service_providers WHERE id = $1"#)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_provider_by_name(&self, name: &str) -> Result<Option<ServiceProvider>, sqlx::Error> {
        sqlx::query_as::<_, ServiceProvider>(r#"SELECT * FROM service_providers WHERE name = $1"#)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_providers(&self) -> Result<Vec<ServiceProvider>, sqlx::Error> {
        sqlx::query_as::<_, ServiceProvider>(
            r#"SELECT * FROM service_providers ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_providers_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServiceProvider>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        sqlx::query_as::<_, ServiceProvider>(r#"SELECT * FROM service_providers WHERE id = ANY($1)"#)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_provider(
        &self,
        provider_id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<ServiceProvider>, sqlx::Error> {
        sqlx::query_as::<_, ServiceProvider>(
            r#"
            UPDATE service_providers
            SET is_available = COALESCE($2, is_available),
                rating = COALESCE($3, rating),
                longitude = COALESCE($4, longitude),
                latitude = COALESCE($5, latitude),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(provider_id)
        .bind(update.is_available)
        .bind(update.rating)
        .bind(update.point.map(|p| p.longitude()))
        .bind(update.point.map(|p| p.latitude()))
        .fetch_optional(&self.pool)
        .await
    }

    async fn increment_service_count(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<ServiceProvider>, sqlx::Error> {
        sqlx::query_as::<_, ServiceProvider>(
            r#"
            UPDATE service_providers
            SET service_count = service_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_provider(&self, provider_id: Uuid) -> Result<ProviderRemoval, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // row lock blocks concurrent accepts on the foreign key until we finish
        let locked = sqlx::query(r#"SELECT id FROM service_providers WHERE id = $1 FOR UPDATE"#)
            .bind(provider_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(ProviderRemoval::NotFound);
        }

        let (busy,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM service_requests
                WHERE selected_provider = $1 AND status = 'accepted'
            ) OR EXISTS (
                SELECT 1 FROM emergencies
                WHERE service_provider = $1 AND status = 'accepted'
            )
            "#,
        )
        .bind(provider_id)
        .fetch_one(&mut *tx)
        .await?;
        if busy {
            return Ok(ProviderRemoval::HasAcceptedWork);
        }

        sqlx::query(r#"DELETE FROM service_providers WHERE id = $1"#)
            .bind(provider_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(r#"DELETE FROM credentials WHERE subject_id = $1"#)
            .bind(provider_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ProviderRemoval::Removed)
    }

    async fn find_nearby_providers(
        &self,
        point: GeoPoint,
        max_distance_m: f64,
        provider_type: Option<ProviderType>,
    ) -> Result<Vec<NearbyProvider>, sqlx::Error> {
        let bbox = BoundingBox::around(&point, max_distance_m);

        let query = format!(
            r#"
            SELECT * FROM (
                SELECT p.*, {HAVERSINE_SQL} AS distance_m
                FROM service_providers p
                WHERE is_available
                  AND latitude BETWEEN $3 AND $4
                  AND longitude BETWEEN $5 AND $6
                  AND ($7::provider_type IS NULL OR provider_type = $7)
            ) nearby
            WHERE distance_m <= $8
            ORDER BY distance_m ASC
            "#
        );

        sqlx::query_as::<_, NearbyProvider>(&query)
            .bind(point.longitude())
            .bind(point.latitude())
            .bind(bbox.min_latitude)
            .bind(bbox.max_latitude)
            .bind(bbox.min_longitude)
            .bind(bbox.max_longitude)
            .bind(provider_type)
            .bind(max_distance_m)
            .fetch_all(&self.pool)
            .await
    }
}
