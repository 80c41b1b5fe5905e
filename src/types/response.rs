//! Response types: retrieved sources, citations and the stream envelope

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::SourceType;

/// One retrieved, formatted source item with a stable synthetic identifier.
///
/// `chunk_id` is `chunk-<source_type>-<item_id>`, stable across calls so
/// citations match even for adapters that do relational fetches rather than
/// vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedSource {
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub source_type: SourceType,
    /// Similarity for vector-search sources, 1.0 for relational fetches
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A resolved pointer from generated text back to the source that grounded
/// it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: Uuid,
    pub chunk_id: String,
    pub document_id: String,
    pub document_title: String,
    /// First 200 characters of the cited content
    pub content_preview: String,
    pub source_type: SourceType,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Citation {
    /// Build a citation candidate from a retrieved source
    pub fn from_retrieved(source: &RetrievedSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk_id: source.chunk_id.clone(),
            document_id: source.document_id.clone(),
            document_title: source.document_title.clone(),
            content_preview: preview(&source.content, 200),
            source_type: source.source_type,
            score: source.score,
            url: None,
            metadata: source.metadata.clone(),
        }
    }
}

/// Truncate to `max` characters on a char boundary
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// One server-to-client streaming event, serialized as a single JSON object
/// per line with the `event` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of generated (or formatted) answer text
    Chunk { content: String },
    /// A citation the answer actually used
    Citation { citation: Citation },
    /// A structured artifact attached to the answer
    Artifact { artifact: serde_json::Value },
    /// Terminal success marker
    Done,
    /// Terminal error marker; text already streamed is not retracted
    Error { error: String },
}

/// Blocking chat response
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub processing_time_ms: u64,
}

/// Retrieval-only search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievedSource>,
    pub total: usize,
    pub query: String,
    pub processing_time_ms: u64,
}

/// Outcome of a single-document vectorization call
#[derive(Debug, Clone, Serialize)]
pub struct VectorizeResponse {
    pub success: bool,
    pub skipped: bool,
    pub message: String,
    pub document_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

/// Summary of a batch vectorization call
#[derive(Debug, Clone, Serialize)]
pub struct BatchVectorizeResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<VectorizeResponse>,
}

/// Organization-level vectorization statistics
#[derive(Debug, Clone, Serialize)]
pub struct RagStats {
    pub organization_id: Uuid,
    /// Document counts by vectorization status
    pub document_counts: std::collections::BTreeMap<String, usize>,
    /// Point counts per collection
    pub collections: std::collections::BTreeMap<String, usize>,
    pub total_points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_events_serialize_with_discriminator() {
        let event = StreamEvent::Chunk {
            content: "hello".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chunk");
        assert_eq!(json["content"], "hello");

        let done = serde_json::to_value(StreamEvent::Done).unwrap();
        assert_eq!(done["event"], "done");

        let err = serde_json::to_value(StreamEvent::Error {
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(err["event"], "error");
        assert_eq!(err["error"], "boom");
    }

    #[test]
    fn citation_preview_is_bounded() {
        let source = RetrievedSource {
            chunk_id: "chunk-documents-doc-1".into(),
            document_id: "doc-1".into(),
            document_title: "Lease".into(),
            content: "x".repeat(500),
            source_type: SourceType::Documents,
            score: 0.9,
            metadata: None,
        };
        let citation = Citation::from_retrieved(&source);
        assert_eq!(citation.content_preview.chars().count(), 200);
    }
}
