//! Vectorization job records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a vectorization job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Per-document vectorization job.
///
/// `chunks_processed < chunks_total` after completion means some upsert
/// batches failed; the document itself still reads `vectorized` and the
/// failed ranges are recorded in `error`. Retry is whole-document
/// (`force=true`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizationJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub organization_id: Uuid,
    pub status: JobStatus,
    pub chunks_total: u32,
    pub chunks_processed: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl VectorizationJob {
    /// Create a job in the processing state
    pub fn processing(document_id: Uuid, organization_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            organization_id,
            status: JobStatus::Processing,
            chunks_total: 0,
            chunks_processed: 0,
            error: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }
}
