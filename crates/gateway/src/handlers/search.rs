//! Search handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::AppState;
use ragforge_common::{
    errors::Result,
    search::{SearchRequest as Query, SearchResult},
};

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    /// Maximum results to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,

    /// Offset for pagination
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize { 10 }

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// Chunk-level hit count reported by the engine
    pub total: u64,
    pub results: Vec<SearchResult>,
    pub processing_time_ms: u64,
}

/// Search the document index
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    request.validate().map_err(validation_error)?;

    let response = state
        .search
        .search(&Query::new(request.query, request.limit, request.offset))
        .await?;

    Ok(Json(SearchResponse {
        query: response.query,
        total: response.total,
        results: response.results,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
