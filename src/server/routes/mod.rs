//! API routes

pub mod chat;
pub mod search;
pub mod vectorization;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Vectorization pipeline
        .route("/vectorization/vectorize", post(vectorization::vectorize))
        .route(
            "/vectorization/vectorize/sync",
            post(vectorization::vectorize_sync),
        )
        .route(
            "/vectorization/vectorize/batch",
            post(vectorization::vectorize_batch),
        )
        .route(
            "/vectorization/documents/:id/vectors",
            delete(vectorization::delete_vectors),
        )
        .route(
            "/vectorization/documents/:id/exclusion",
            post(vectorization::set_exclusion),
        )
        .route("/vectorization/jobs/:id", get(vectorization::get_job))
        .route(
            "/vectorization/stats/:organization_id",
            get(vectorization::stats),
        )
        // Retrieval-only search
        .route("/search", post(search::search))
        // Chat with citations
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "estate-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "RAG over property-management records with verified citations",
        "endpoints": {
            "POST /api/vectorization/vectorize": "Vectorize a document in the background",
            "POST /api/vectorization/vectorize/sync": "Vectorize a document and wait",
            "POST /api/vectorization/vectorize/batch": "Vectorize several documents",
            "DELETE /api/vectorization/documents/:id/vectors": "Drop a document's vectors",
            "POST /api/vectorization/documents/:id/exclusion": "Toggle soft exclusion",
            "GET /api/vectorization/jobs/:id": "Vectorization job status",
            "GET /api/vectorization/stats/:organization_id": "Index statistics",
            "POST /api/search": "Multi-source retrieval",
            "POST /api/chat": "Chat turn with citations",
            "POST /api/chat/stream": "Streaming chat turn (NDJSON events)"
        }
    }))
}
