//1
use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoError, GeoPoint};

/// Which identity class a credential resolves to.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    ServiceProvider,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::ServiceProvider => "service_provider",
            UserRole::Admin => "admin",
        }
    }
}

/// One row of the unified credential index. Every login email maps to
/// exactly one role and one subject id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credential {
    pub email: String,
    pub role: UserRole,
    pub subject_id: Uuid,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Location {
    pub state: String,
    pub district: String,
    pub city: String,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub longitude: f64,
    pub latitude: f64,
    pub guardian_emails: Vec<String>,
    pub other_contact: Vec<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn location(&self) -> Location {
        Location {
            state: self.state.clone(),
            district: self.district.clone(),
            city: self.city.clone(),
        }
    }

    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.longitude, self.latitude)
    }

    pub fn has_guardians(&self) -> bool {
        !self.guardian_emails.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub mobile: String,
    pub location: Location,
    pub point: GeoPoint,
    pub other_contact: Vec<String>,
}

/// Fields a user may change on their own profile. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub location: Option<Location>,
    pub other_contact: Option<Vec<String>>,
    pub guardian_emails: Option<Vec<String>>,
}
