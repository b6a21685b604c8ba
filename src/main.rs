mod models;
mod service;
mod config;
mod dtos;
mod error;
mod db;
mod geo;
mod utils;
mod middleware;
mod mail;
mod handler;
mod routes;

use std::{str::FromStr, sync::Arc};

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use db::{DBClient, MemoryStore, Store};
use dotenv::dotenv;
use routes::create_router;
use service::{
    emergency_service::EmergencyService,
    matching_service::MatchingService,
    notification_service::{EmailNotifier, GuardianNotifier, LogNotifier},
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn Store>,
    pub matching_service: MatchingService,
    pub emergency_service: EmergencyService,
}

impl AppState {
    pub fn new(env: Config, db_client: Arc<dyn Store>, notifier: Arc<dyn GuardianNotifier>) -> Self {
        let matching_service = MatchingService::new(
            db_client.clone(),
            env.service_match_radius_m,
            env.nearby_activity_radius_m,
        );
        let emergency_service = EmergencyService::new(
            db_client.clone(),
            notifier,
            env.emergency_radius_m,
            env.emergency_map_radius_m,
        );

        AppState {
            env,
            db_client,
            matching_service,
            emergency_service,
        }
    }
}

async fn connect_store(config: &Config) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    tracing::info!("✅Connection to the database is successful!");

    let db_client = DBClient::new(pool);
    db_client.migrate().await?;
    tracing::info!("Migrations applied");

    Ok(Arc::new(db_client))
}

async fn seed_admin(config: &Config, store: &dyn Store) {
    let (Some(email), Some(admin_password)) = (&config.admin_email, &config.admin_password) else {
        return;
    };

    let hashed = match utils::password::hash(admin_password) {
        Ok(hashed) => hashed,
        Err(e) => {
            tracing::error!("Could not hash the admin password: {}", e.to_string());
            return;
        }
    };

    match store.save_admin_credential(email, &hashed).await {
        Ok(_) => tracing::info!("Admin credential ready for {}", email),
        Err(e) => tracing::error!("Could not seed the admin credential for {}: {}", email, e),
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🔥 Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::DEBUG))
        .init();

    let db_client = match connect_store(&config).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };
    tracing::info!("Using the {} store", db_client.backend_name());

    seed_admin(&config, db_client.as_ref()).await;

    let notifier: Arc<dyn GuardianNotifier> = match &config.smtp {
        Some(smtp) => Arc::new(EmailNotifier::new(smtp.clone())),
        None => {
            tracing::warn!("SMTP_HOST not set, guardian alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let allowed_origins = ["http://localhost:5173", "http://localhost:3000"]
        .into_iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = AppState::new(config.clone(), db_client, notifier);

    let app = create_router(Arc::new(app_state)).layer(cors);

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("🔥 Could not bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}
