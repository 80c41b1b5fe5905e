//! Chat endpoints: blocking turns and the NDJSON event stream

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{response::ChatResponse, ChatRequest};

/// POST /api/chat - blocking chat turn
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    tracing::info!("Chat turn: \"{}\" (mode {:?})", request.message, request.mode);
    let response = state.pipeline().run_blocking(&request).await?;
    tracing::info!(
        "Chat turn completed in {}ms with {} citations",
        response.processing_time_ms,
        response.citations.len()
    );
    Ok(Json(response))
}

/// POST /api/chat/stream - one JSON envelope object per line
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    tracing::info!(
        "Streaming chat turn: \"{}\" (mode {:?})",
        request.message,
        request.mode
    );

    let events = Arc::clone(state.pipeline()).run_stream(request);

    let body = Body::from_stream(events.map(|event| {
        let line = serde_json::to_string(&event).unwrap_or_else(|e| {
            format!(r#"{{"event":"error","error":"serialization failed: {}"}}"#, e)
        });
        Ok::<_, Infallible>(format!("{}\n", line))
    }));

    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}
