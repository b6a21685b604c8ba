use std::sync::Arc;

use axum::{extract::Query, response::IntoResponse, routing::get, Extension, Json, Router};
use axum_extra::extract::WithRejection;

use crate::{
    dtos::{NearbyActivityDto, NearbyActivityResponseDto, PointQueryDto},
    error::HttpError,
    AppState,
};

pub fn activity_handler() -> Router {
    Router::new().route("/nearby", get(nearby_activity))
}

pub async fn nearby_activity(
    WithRejection(Query(query), _): WithRejection<Query<PointQueryDto>, HttpError>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let point = query
        .point()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let activity = app_state
        .matching_service
        .nearby_pending_activity(point)
        .await?;

    Ok(Json(NearbyActivityResponseDto {
        status: "success".to_string(),
        results: activity.len(),
        activity: activity.iter().map(NearbyActivityDto::from).collect(),
    }))
}
