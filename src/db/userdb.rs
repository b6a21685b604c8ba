use async_trait::async_trait;
use uuid::Uuid;

use super::DBClient;
use crate::models::usermodel::*;

#[async_trait]
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, sqlx::Error>;

    /// Inserts the user together with its credential row.
    async fn save_user(&self, new_user: NewUser) -> Result<User, sqlx::Error>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn update_guardian_emails(
        &self,
        user_id: Uuid,
        guardian_emails: Vec<String>,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn get_credential(&self, email: &str) -> Result<Option<Credential>, sqlx::Error>;

    /// Inserts or replaces the admin credential for `email`.
    async fn save_admin_credential(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Credential, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_mobile(&self, mobile: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE mobile = $1"#)
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
            (name, email, mobile, state, district, city, longitude, latitude, other_contact)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.mobile)
        .bind(&new_user.location.state)
        .bind(&new_user.location.district)
        .bind(&new_user.location.city)
        .bind(new_user.point.longitude())
        .bind(new_user.point.latitude())
        .bind(&new_user.other_contact)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credentials (email, role, subject_id, password)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.email)
        .bind(UserRole::User)
        .bind(user.id)
        .bind(&new_user.password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        update: UserProfileUpdate,
    ) -> Result<Option<User>, sqlx::Error> {
        let (state, district, city) = match update.location {
            Some(location) => (Some(location.state), Some(location.district), Some(location.city)),
            None => (None, None, None),
        };

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                mobile = COALESCE($3, mobile),
                state = COALESCE($4, state),
                district = COALESCE($5, district),
                city = COALESCE($6, city),
                other_contact = COALESCE($7, other_contact),
                guardian_emails = COALESCE($8, guardian_emails),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(update.name)
        .bind(update.mobile)
        .bind(state)
        .bind(district)
        .bind(city)
        .bind(update.other_contact)
        .bind(update.guardian_emails)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_guardian_emails(
        &self,
        user_id: Uuid,
        guardian_emails: Vec<String>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET guardian_emails = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(guardian_emails)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_credential(&self, email: &str) -> Result<Option<Credential>, sqlx::Error> {
        sqlx::query_as::<_, Credential>(r#"SELECT * FROM credentials WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn save_admin_credential(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Credential, sqlx::Error> {
        sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (email, role, subject_id, password)
            VALUES ($1, 'admin', $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET password = EXCLUDED.password
            WHERE credentials.role = 'admin'
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(Uuid::new_v4())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }
}
