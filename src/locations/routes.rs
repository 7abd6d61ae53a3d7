//! Read-only endpoints for the location picker.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::ApiQuery;

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub prefecture: Option<String>,
}

/// GET /api/locations?prefecture=
async fn list_locations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let prefecture = query
        .prefecture
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    Ok(Json(state.db.list_locations(prefecture).await?))
}

/// GET /api/locations/prefectures
async fn list_prefectures(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_prefectures().await?))
}

/// GET /api/locations/{id}
async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let location = state
        .db
        .get_location(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("location not found: {id}")))?;
    Ok(Json(location))
}

pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/api/locations", get(list_locations))
        .route("/api/locations/prefectures", get(list_prefectures))
        .route("/api/locations/{id}", get(get_location))
}
