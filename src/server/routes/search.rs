//! Retrieval-only search endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{response::SearchResponse, SearchRequest};

/// POST /api/search - multi-source retrieval without generation
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    let results = state
        .orchestrator()
        .search_sources(
            &request.query,
            request.organization_id,
            &request.source_types,
            &request.filters(),
            request.limit,
        )
        .await?;

    tracing::info!(
        "Search \"{}\" across {} source types: {} results",
        request.query,
        request.source_types.len(),
        results.len()
    );

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        query: request.query,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
