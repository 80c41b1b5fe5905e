//! Document records owned by the ingestion caller, mutated only by the
//! vectorization pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::SourceType;

/// Vectorization status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizationStatus {
    /// Never queued for vectorization
    NotPlanned,
    /// Queued but not yet started
    Pending,
    /// Pipeline currently running
    InProgress,
    /// Indexed; content_hash reflects the indexed bytes
    Vectorized,
    /// Pipeline failed; vectorization_error carries the reason
    Error,
}

impl VectorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotPlanned => "not_planned",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Vectorized => "vectorized",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "vectorized" => Self::Vectorized,
            "error" => Self::Error,
            _ => Self::NotPlanned,
        }
    }
}

/// An organizational document with already-extracted plain text.
///
/// Upload, storage and OCR happen upstream; by the time a record lands here
/// its `content` is the extracted text the pipeline chunks and embeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Owning organization
    pub organization_id: Uuid,
    /// Display title
    pub title: String,
    /// Record category; determines the target collection
    pub category: SourceType,
    /// Extracted plain text
    pub content: String,
    /// SHA-256 of the content, set when vectorized
    pub content_hash: Option<String>,
    /// Current vectorization status
    pub vectorization_status: VectorizationStatus,
    /// Last vectorization error, if any
    pub vectorization_error: Option<String>,
    /// Number of chunks in the index
    pub chunk_count: u32,
    /// Collection the chunks live in
    pub collection_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vectorization_started_at: Option<DateTime<Utc>>,
    pub vectorization_completed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new document pending vectorization
    pub fn new(
        organization_id: Uuid,
        title: impl Into<String>,
        category: SourceType,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            title: title.into(),
            category,
            content: content.into(),
            content_hash: None,
            vectorization_status: VectorizationStatus::NotPlanned,
            vectorization_error: None,
            chunk_count: 0,
            collection_name: None,
            created_at: now,
            updated_at: now,
            vectorization_started_at: None,
            vectorization_completed_at: None,
        }
    }
}
