//! Local deterministic providers: a hash-seeded embedder and an in-process
//! vector index.
//!
//! These back tests and offline runs with the exact same traits the HTTP
//! providers implement, so the pipeline can be exercised end to end without
//! network access.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::index::{Distance, IndexPoint, ScoredPoint, SearchFilter, VectorIndex};

use super::embedding::{sanitize_input, EmbeddingProvider};

/// Deterministic embedder: vectors are derived from a SHA-256 of the input,
/// so equal texts embed identically across runs.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed calls made; lets tests assert the idempotence
    /// short-circuit issued zero provider calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let seed = Sha256::digest(text.as_bytes());
        let mut vector = Vec::with_capacity(self.dimensions);

        for i in 0..self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update((i as u64).to_le_bytes());
            let digest = hasher.finalize();
            let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
            vector.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(sanitize_input(text)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

struct MemoryCollection {
    dimensions: usize,
    points: Vec<IndexPoint>,
}

/// In-process vector index with cosine scoring
#[derive(Default)]
pub struct MemoryVectorIndex {
    collections: DashMap<String, MemoryCollection>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        _distance: Distance,
    ) -> Result<()> {
        if let Some(existing) = self.collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(Error::Config(format!(
                    "Collection '{}' has dimension {} but {} was requested",
                    name, existing.dimensions, dimensions
                )));
            }
            return Ok(());
        }
        self.collections.insert(
            name.to_string(),
            MemoryCollection {
                dimensions,
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, points: &[IndexPoint]) -> Result<()> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::vector_index(format!("Collection '{}' does not exist", collection)))?;

        for point in points {
            if point.vector.len() != entry.dimensions {
                return Err(Error::Config(format!(
                    "Vector dimension {} does not match collection dimension {}",
                    point.vector.len(),
                    entry.dimensions
                )));
            }
            match entry.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point.clone(),
                None => entry.points.push(point.clone()),
            }
        }
        Ok(())
    }

    async fn delete_by_document(&self, collection: &str, document_id: &str) -> Result<usize> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entry.points.len();
        entry.points.retain(|p| !p.payload.matches_document(document_id));
        Ok(before - entry.points.len())
    }

    async fn set_excluded(
        &self,
        collection: &str,
        document_id: &str,
        excluded: bool,
    ) -> Result<usize> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0;
        for point in entry.points.iter_mut() {
            if point.payload.matches_document(document_id) {
                point.payload.is_excluded = excluded;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredPoint>> {
        let Some(entry) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredPoint> = entry
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.get(collection).map_or(0, |c| c.points.len()))
    }

    async fn list_collections(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PointPayload;
    use chrono::Utc;

    fn point(id: &str, document_id: &str, vector: Vec<f32>) -> IndexPoint {
        IndexPoint {
            id: id.to_string(),
            vector,
            payload: PointPayload {
                document_id: document_id.to_string(),
                organization_id: "org-1".to_string(),
                content: format!("content of {}", id),
                content_hash: "hash".to_string(),
                chunk_index: 0,
                total_chunks: 1,
                source_type: "documents".to_string(),
                source_id: document_id.to_string(),
                semantic_tags: vec![],
                metadata: serde_json::json!({ "document_id": document_id }),
                is_excluded: false,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn embedder_is_deterministic() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        let c = embedder.embed("different text").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert_eq!(embedder.call_count(), 3);
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent_and_checks_dimension() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("c", 8, Distance::Cosine).await.unwrap();
        index.ensure_collection("c", 8, Distance::Cosine).await.unwrap();
        let err = index.ensure_collection("c", 16, Distance::Cosine).await;
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        let result = index
            .upsert_points("c", vec![point("p1", "d1", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(result.is_complete());
        index
            .upsert_points("c", vec![point("p1", "d1", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(index.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exclusion_round_trip_preserves_points() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();
        index
            .upsert_points(
                "c",
                vec![point("p1", "d1", vec![1.0, 0.0]), point("p2", "d1", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let snapshot_before = index.search("c", &[1.0, 0.0], &SearchFilter::default(), 10, -1.0).await.unwrap();

        assert_eq!(index.set_excluded("c", "d1", true).await.unwrap(), 2);
        let excluded = index
            .search("c", &[1.0, 0.0], &SearchFilter::default(), 10, -1.0)
            .await
            .unwrap();
        assert!(excluded.is_empty());

        assert_eq!(index.set_excluded("c", "d1", false).await.unwrap(), 2);
        let snapshot_after = index.search("c", &[1.0, 0.0], &SearchFilter::default(), 10, -1.0).await.unwrap();

        assert_eq!(snapshot_before.len(), snapshot_after.len());
        for (before, after) in snapshot_before.iter().zip(&snapshot_after) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.payload.content, after.payload.content);
            assert_eq!(before.score, after.score);
        }
    }

    #[tokio::test]
    async fn delete_matches_nested_document_id_too() {
        let index = MemoryVectorIndex::new();
        index.ensure_collection("c", 2, Distance::Cosine).await.unwrap();

        // Simulate the older write path: document id only in nested metadata
        let mut legacy = point("p-legacy", "other", vec![1.0, 0.0]);
        legacy.payload.document_id = "unrelated".to_string();
        legacy.payload.metadata = serde_json::json!({ "document_id": "d-legacy" });

        index.upsert_points("c", vec![legacy]).await.unwrap();
        assert_eq!(index.delete_by_document("c", "d-legacy").await.unwrap(), 1);
        assert_eq!(index.count("c").await.unwrap(), 0);
    }
}
