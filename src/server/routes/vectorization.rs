//! Vectorization endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::{BatchVectorizeResponse, RagStats, VectorizeResponse};
use crate::types::VectorizationJob;
use crate::vectorization::VectorizeOutcome;

#[derive(Debug, Deserialize)]
pub struct VectorizeRequest {
    pub document_id: Uuid,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct VectorizeBatchRequest {
    pub document_ids: Vec<Uuid>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExclusionRequest {
    pub excluded: bool,
}

fn outcome_to_response(outcome: VectorizeOutcome) -> VectorizeResponse {
    let message = if outcome.skipped {
        "Document already vectorized with identical content".to_string()
    } else {
        match &outcome.batch {
            Some(batch) if !batch.is_complete() => format!(
                "Vectorized with partial success: {} of {} chunks stored",
                batch.succeeded_ids.len(),
                outcome.chunk_count
            ),
            _ => format!("Vectorized {} chunks", outcome.chunk_count),
        }
    };

    VectorizeResponse {
        success: true,
        skipped: outcome.skipped,
        message,
        document_id: outcome.document_id,
        job_id: outcome.job_id,
        chunk_count: Some(outcome.chunk_count),
        collection_name: Some(outcome.collection_name),
    }
}

/// POST /api/vectorization/vectorize - fire-and-forget background run
pub async fn vectorize(
    State(state): State<AppState>,
    Json(request): Json<VectorizeRequest>,
) -> Result<Json<VectorizeResponse>> {
    // Surface not-found before accepting the background job
    state
        .db()
        .get_document(request.document_id)?
        .ok_or_else(|| Error::DocumentNotFound(request.document_id.to_string()))?;

    let vectorizer = state.vectorizer().clone();
    let document_id = request.document_id;
    let force = request.force;
    tokio::spawn(async move {
        if let Err(e) = vectorizer.vectorize_document(document_id, force).await {
            tracing::error!("Background vectorization of {} failed: {}", document_id, e);
        }
    });

    Ok(Json(VectorizeResponse {
        success: true,
        skipped: false,
        message: "Vectorization started in background. Check document status for progress."
            .to_string(),
        document_id: request.document_id,
        job_id: None,
        chunk_count: None,
        collection_name: None,
    }))
}

/// POST /api/vectorization/vectorize/sync - blocking run
pub async fn vectorize_sync(
    State(state): State<AppState>,
    Json(request): Json<VectorizeRequest>,
) -> Result<Json<VectorizeResponse>> {
    let outcome = state
        .vectorizer()
        .vectorize_document(request.document_id, request.force)
        .await?;
    Ok(Json(outcome_to_response(outcome)))
}

/// POST /api/vectorization/vectorize/batch - sequential batch run
pub async fn vectorize_batch(
    State(state): State<AppState>,
    Json(request): Json<VectorizeBatchRequest>,
) -> Result<Json<BatchVectorizeResponse>> {
    let batch = state
        .vectorizer()
        .vectorize_batch(&request.document_ids, request.force)
        .await;

    let results = batch
        .outcomes
        .into_iter()
        .map(|(document_id, result)| match result {
            Ok(outcome) => outcome_to_response(outcome),
            Err(e) => VectorizeResponse {
                success: false,
                skipped: false,
                message: e.to_string(),
                document_id,
                job_id: None,
                chunk_count: None,
                collection_name: None,
            },
        })
        .collect();

    Ok(Json(BatchVectorizeResponse {
        total: batch.total,
        succeeded: batch.succeeded,
        failed: batch.failed,
        skipped: batch.skipped,
        results,
    }))
}

/// DELETE /api/vectorization/documents/:id/vectors
pub async fn delete_vectors(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.vectorizer().delete_document_vectors(id).await?;
    Ok(Json(serde_json::json!({
        "document_id": id,
        "deleted_points": deleted,
    })))
}

/// POST /api/vectorization/documents/:id/exclusion
pub async fn set_exclusion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExclusionRequest>,
) -> Result<Json<serde_json::Value>> {
    let updated = state
        .vectorizer()
        .set_document_exclusion(id, request.excluded)
        .await?;
    Ok(Json(serde_json::json!({
        "document_id": id,
        "excluded": request.excluded,
        "updated_points": updated,
    })))
}

/// GET /api/vectorization/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VectorizationJob>> {
    let job = state
        .jobs()
        .get(id)?
        .ok_or_else(|| Error::DocumentNotFound(format!("job {}", id)))?;
    Ok(Json(job))
}

/// GET /api/vectorization/stats/:organization_id
pub async fn stats(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<RagStats>> {
    let stats = state.vectorizer().stats(organization_id).await?;
    Ok(Json(stats))
}
