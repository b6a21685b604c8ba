//5
pub mod userdb;
pub mod providerdb;
pub mod requestdb;
pub mod emergencydb;
pub mod memory;

use sqlx::{Pool, Postgres};

pub use emergencydb::EmergencyExt;
pub use memory::MemoryStore;
pub use providerdb::ProviderExt;
pub use requestdb::ServiceRequestExt;
pub use userdb::UserExt;

/// Everything the services need from persistence. Implemented by the
/// Postgres-backed [`DBClient`] and by [`MemoryStore`].
pub trait Store:
    UserExt + ProviderExt + ServiceRequestExt + EmergencyExt + std::fmt::Debug + Send + Sync
{
    fn backend_name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

impl Store for DBClient {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Great-circle distance in meters between the row's `longitude`/`latitude`
/// columns and the point bound at `$1` (longitude) and `$2` (latitude).
/// Mirrors `geo::haversine_distance_m`.
pub(crate) const HAVERSINE_SQL: &str = r#"
    2 * 6371008.8 * asin(least(1.0, sqrt(
        power(sin(radians(latitude - $2) / 2), 2)
        + cos(radians($2)) * cos(radians(latitude))
        * power(sin(radians(longitude - $1) / 2), 2)
    )))
"#;
