//! Tag lookup endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::model::CodeType;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::ApiQuery;

#[derive(Debug, Default, Deserialize)]
pub struct CodeQuery {
    #[serde(default, rename = "type")]
    pub code_type: Option<CodeType>,
}

/// GET /api/codes?type=want_you|can_do
async fn list_codes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CodeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.db.list_codes(query.code_type).await?))
}

pub fn code_routes() -> Router<AppState> {
    Router::new().route("/api/codes", get(list_codes))
}
