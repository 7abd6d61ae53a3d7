//! Autocomplete endpoints backed by phrases mined from job posts.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use super::model::SuggestionQuery;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::ApiQuery;

/// GET /api/suggestions?q=&category=&limit=
async fn suggest(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SuggestionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hits = state
        .db
        .search_suggestions(query.query(), query.category(), query.limit())
        .await?;
    Ok(Json(hits))
}

/// GET /api/suggestions/categories
async fn categories(State(state): State<AppState>) -> impl IntoResponse {
    let names: Vec<String> = state
        .classifier
        .categories()
        .into_iter()
        .map(String::from)
        .collect();
    Json(names)
}

/// GET /api/jobs/{id}/suggestions
async fn post_suggestions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.jobs.get(id).await?;
    Ok(Json(state.db.list_suggestions_for_post(id).await?))
}

pub fn suggestion_routes() -> Router<AppState> {
    Router::new()
        .route("/api/suggestions", get(suggest))
        .route("/api/suggestions/categories", get(categories))
        .route("/api/jobs/{id}/suggestions", get(post_suggestions))
}
