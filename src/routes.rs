use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        activity::activity_handler, admin::admin_handler, auth::auth_handler,
        emergency::emergency_handler, provider::provider_handler, request::request_handler,
        users::users_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_checker() -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "message": "Roadside assistance API is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .route("/healthchecker", get(health_checker))
        .nest("/auth", auth_handler())
        .nest("/users", users_handler().layer(middleware::from_fn(auth)))
        .nest("/requests", request_handler().layer(middleware::from_fn(auth)))
        .nest("/provider", provider_handler().layer(middleware::from_fn(auth)))
        .nest("/emergencies", emergency_handler().layer(middleware::from_fn(auth)))
        .nest("/activity", activity_handler().layer(middleware::from_fn(auth)))
        .nest("/admin", admin_handler().layer(middleware::from_fn(auth)))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new().nest("/api", api_route)
}
