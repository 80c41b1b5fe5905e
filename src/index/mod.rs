//! Vector index management: collection lifecycle, idempotent upserts,
//! document-scoped deletes and the soft-exclusion flag.
//!
//! Tenant and category isolation is enforced by storage topology: every
//! organization/category pair gets its own collection, named by
//! [`collection_name`], rather than relying solely on query filters.

pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Deterministic collection name: `org_<organization_id>_<category>`.
/// The category segment is lowercased with spaces and hyphens mapped to
/// underscores.
pub fn collection_name(organization_id: Uuid, category: &str) -> String {
    let clean = category.to_lowercase().replace([' ', '-'], "_");
    format!("org_{}_{}", organization_id, clean)
}

/// Prefix shared by all of an organization's collections
pub fn organization_prefix(organization_id: Uuid) -> String {
    format!("org_{}_", organization_id)
}

/// Distance metric for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Euclid => "Euclid",
            Distance::Dot => "Dot",
        }
    }
}

/// Payload stored alongside each vector.
///
/// `document_id` at the root is canonical. `metadata` additionally carries a
/// nested `document_id` because two historical write paths exist; deletes
/// and exclusion updates match either location until a full re-index
/// retires the nested one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub document_id: String,
    pub organization_id: String,
    pub content: String,
    pub content_hash: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub source_type: String,
    pub source_id: String,
    pub semantic_tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub is_excluded: bool,
    pub created_at: DateTime<Utc>,
}

impl PointPayload {
    /// Whether this payload belongs to `document_id`, checking both the
    /// root field and the nested metadata field.
    pub fn matches_document(&self, document_id: &str) -> bool {
        if self.document_id == document_id {
            return true;
        }
        self.metadata
            .get("document_id")
            .and_then(|v| v.as_str())
            .is_some_and(|id| id == document_id)
    }
}

/// One point to upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A search hit
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Filter for vector search
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub organization_id: Option<String>,
    pub source_types: Option<Vec<String>>,
    pub document_ids: Option<Vec<String>>,
    /// Excluded points are filtered out unless explicitly requested
    pub include_excluded: bool,
}

impl SearchFilter {
    pub fn matches(&self, payload: &PointPayload) -> bool {
        if let Some(org) = &self.organization_id {
            if &payload.organization_id != org {
                return false;
            }
        }
        if let Some(types) = &self.source_types {
            if !types.contains(&payload.source_type) {
                return false;
            }
        }
        if let Some(ids) = &self.document_ids {
            if !ids.contains(&payload.document_id) {
                return false;
            }
        }
        if !self.include_excluded && payload.is_excluded {
            return false;
        }
        true
    }
}

/// A batch that failed to upsert
#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    /// Point index range `[start, end)` within the submitted slice
    pub range: (usize, usize),
    pub error: String,
}

/// Outcome of a best-effort bulk upsert. Callers decide whether partial
/// success is acceptable instead of inferring it from counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub succeeded_ids: Vec<String>,
    pub failed_batches: Vec<FailedBatch>,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_batches.iter().map(|b| b.range.1 - b.range.0).sum()
    }
}

/// Trait for the external vector index.
///
/// Constructed once per process and injected, which keeps provider swaps and
/// deterministic test fakes cheap.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if absent. Idempotent; racing creators that
    /// hit "already exists" are treated as success.
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<()>;

    /// Upsert one batch of points. Implementations do a single provider
    /// call; batching and error accounting live in [`upsert_points`].
    async fn upsert_batch(&self, collection: &str, points: &[IndexPoint]) -> Result<()>;

    /// Points per batch for [`upsert_points`]
    fn upsert_batch_size(&self) -> usize {
        10
    }

    /// Best-effort bulk upsert: a failed batch is logged and recorded but
    /// does not abort the remaining batches.
    async fn upsert_points(&self, collection: &str, points: Vec<IndexPoint>) -> Result<BatchResult> {
        let batch_size = self.upsert_batch_size().max(1);
        let total = points.len();
        let mut result = BatchResult::default();

        for (batch_no, batch) in points.chunks(batch_size).enumerate() {
            let start = batch_no * batch_size;
            let end = start + batch.len();
            match self.upsert_batch(collection, batch).await {
                Ok(()) => {
                    result.succeeded_ids.extend(batch.iter().map(|p| p.id.clone()));
                }
                Err(e) => {
                    tracing::error!(
                        "Upsert batch {}..{} of {} into '{}' failed: {}",
                        start,
                        end,
                        total,
                        collection,
                        e
                    );
                    result.failed_batches.push(FailedBatch {
                        range: (start, end),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Delete every point belonging to a document, matching the document id
    /// at both payload locations. Returns the number of points removed.
    async fn delete_by_document(&self, collection: &str, document_id: &str) -> Result<usize>;

    /// Flip the `is_excluded` payload flag on all of a document's points
    /// without touching vectors. Returns the number of points updated.
    async fn set_excluded(
        &self,
        collection: &str,
        document_id: &str,
        excluded: bool,
    ) -> Result<usize>;

    /// Similarity search
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredPoint>>;

    /// Point count for a collection (0 if it does not exist)
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Collections whose names start with `prefix`
    async fn list_collections(&self, prefix: &str) -> Result<Vec<String>>;

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Fails the batch containing a chosen point index; everything else
    /// succeeds. Exercises the best-effort bulk-load accounting.
    struct FlakyIndex {
        fail_from: usize,
        fail_to: usize,
    }

    #[async_trait]
    impl VectorIndex for FlakyIndex {
        async fn ensure_collection(
            &self,
            _name: &str,
            _dimensions: usize,
            _distance: Distance,
        ) -> Result<()> {
            Ok(())
        }

        async fn upsert_batch(&self, _collection: &str, points: &[IndexPoint]) -> Result<()> {
            let first: usize = points[0].payload.chunk_index as usize;
            if first >= self.fail_from && first < self.fail_to {
                return Err(Error::vector_index("storage node unavailable"));
            }
            Ok(())
        }

        async fn delete_by_document(&self, _collection: &str, _document_id: &str) -> Result<usize> {
            Ok(0)
        }

        async fn set_excluded(
            &self,
            _collection: &str,
            _document_id: &str,
            _excluded: bool,
        ) -> Result<usize> {
            Ok(0)
        }

        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            _filter: &SearchFilter,
            _limit: usize,
            _min_score: f32,
        ) -> Result<Vec<ScoredPoint>> {
            Ok(Vec::new())
        }

        async fn count(&self, _collection: &str) -> Result<usize> {
            Ok(0)
        }

        async fn list_collections(&self, _prefix: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn test_point(i: u32) -> IndexPoint {
        IndexPoint {
            id: format!("p{}", i),
            vector: vec![0.0; 4],
            payload: PointPayload {
                document_id: "d".into(),
                organization_id: "o".into(),
                content: String::new(),
                content_hash: String::new(),
                chunk_index: i,
                total_chunks: 25,
                source_type: "documents".into(),
                source_id: "d".into(),
                semantic_tags: vec![],
                metadata: serde_json::json!({}),
                is_excluded: false,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn failed_batch_is_recorded_without_aborting_the_rest() {
        // Points 10..20 fail; batches before and after still land
        let index = FlakyIndex {
            fail_from: 10,
            fail_to: 20,
        };
        let points: Vec<IndexPoint> = (0..25).map(test_point).collect();
        let result = index.upsert_points("c", points).await.unwrap();

        assert_eq!(result.succeeded_ids.len(), 15);
        assert_eq!(result.failed_batches.len(), 1);
        assert_eq!(result.failed_batches[0].range, (10, 20));
        assert!(result.failed_batches[0].error.contains("storage node unavailable"));
        assert!(!result.is_complete());
        assert_eq!(result.failed_count(), 10);
        // Later points made it through
        assert!(result.succeeded_ids.contains(&"p24".to_string()));
    }

    #[test]
    fn collection_names_are_sanitized() {
        let org = Uuid::nil();
        assert_eq!(
            collection_name(org, "Lease Contracts"),
            format!("org_{}_lease_contracts", org)
        );
        assert_eq!(
            collection_name(org, "kpi-rollups"),
            format!("org_{}_kpi_rollups", org)
        );
    }

    #[test]
    fn payload_matches_either_document_id_location() {
        let payload = PointPayload {
            document_id: "root-id".into(),
            organization_id: "org".into(),
            content: String::new(),
            content_hash: String::new(),
            chunk_index: 0,
            total_chunks: 1,
            source_type: "documents".into(),
            source_id: "root-id".into(),
            semantic_tags: vec![],
            metadata: serde_json::json!({ "document_id": "nested-id" }),
            is_excluded: false,
            created_at: Utc::now(),
        };
        assert!(payload.matches_document("root-id"));
        assert!(payload.matches_document("nested-id"));
        assert!(!payload.matches_document("other"));
    }
}
