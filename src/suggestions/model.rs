//! Suggestion rows mined from job posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostSuggestion {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub category: String,
    pub phrase: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionHit {
    pub phrase: String,
    pub category: String,
    /// Number of posts the phrase was mined from.
    pub count: u64,
}

pub const DEFAULT_SUGGESTION_LIMIT: u32 = 10;
pub const MAX_SUGGESTION_LIMIT: u32 = 50;

/// Query string of `GET /api/suggestions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SuggestionQuery {
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
            .clamp(1, MAX_SUGGESTION_LIMIT)
    }

    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
