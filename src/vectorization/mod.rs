//! Vectorization pipeline: chunk → embed → upsert, with idempotent
//! content-hash short-circuiting and per-document write serialization.

pub mod jobs;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::chunking::{chunk_text, extract_semantic_tags, ChunkingConfig};
use crate::error::{Error, Result};
use crate::index::{
    collection_name, organization_prefix, BatchResult, Distance, IndexPoint, PointPayload,
    VectorIndex,
};
use crate::providers::EmbeddingProvider;
use crate::storage::Database;
use crate::types::{response::RagStats, Document, VectorizationJob, VectorizationStatus};

pub use jobs::JobTracker;

/// Outcome of one vectorize call
#[derive(Debug, Clone)]
pub struct VectorizeOutcome {
    pub document_id: Uuid,
    /// True when the unchanged-content short-circuit fired
    pub skipped: bool,
    pub chunk_count: u32,
    pub collection_name: String,
    pub job_id: Option<Uuid>,
    /// Upsert accounting; `None` when the call was skipped
    pub batch: Option<BatchResult>,
}

/// Summary of a batch vectorize call
#[derive(Debug)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<(Uuid, Result<VectorizeOutcome>)>,
}

/// Drives the indexing pipeline for documents
pub struct Vectorizer {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    jobs: Arc<JobTracker>,
    /// Per-document lease serializing delete + re-embed + upsert, so two
    /// concurrent vectorize calls for one document cannot interleave
    locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
}

fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

impl Vectorizer {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        jobs: Arc<JobTracker>,
    ) -> Self {
        Self {
            db,
            embedder,
            index,
            jobs,
            locks: DashMap::new(),
        }
    }

    fn document_lock(&self, document_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(document_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Vectorize one document.
    ///
    /// `force=false` with an unchanged content hash and a `vectorized`
    /// status short-circuits the whole pipeline with zero provider calls.
    /// `force=true` deletes existing points first, then re-embeds and
    /// re-upserts; there is no atomic swap, so a reader racing that window
    /// may see zero or partial results.
    pub async fn vectorize_document(
        &self,
        document_id: Uuid,
        force: bool,
    ) -> Result<VectorizeOutcome> {
        let lock = self.document_lock(document_id);
        let _lease = lock.lock().await;

        let doc = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

        let content_hash = sha256_hex(&doc.content);
        let collection = collection_name(doc.organization_id, doc.category.as_str());

        if !force
            && doc.vectorization_status == VectorizationStatus::Vectorized
            && doc.content_hash.as_deref() == Some(content_hash.as_str())
        {
            tracing::info!(
                "Document {} already vectorized with identical content, skipping",
                document_id
            );
            return Ok(VectorizeOutcome {
                document_id,
                skipped: true,
                chunk_count: doc.chunk_count,
                collection_name: collection,
                job_id: None,
                batch: None,
            });
        }

        self.db.mark_vectorization_started(document_id)?;
        let mut job = self.jobs.begin(document_id, doc.organization_id);

        match self
            .run_pipeline(&doc, &collection, &content_hash, force, &mut job)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Vectorization failed for document {}: {}", document_id, message);
                if let Err(db_err) = self.db.mark_vectorization_error(document_id, &message) {
                    tracing::error!("Failed to record document error: {}", db_err);
                }
                self.jobs.fail(&mut job, &message);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        doc: &Document,
        collection: &str,
        content_hash: &str,
        force: bool,
        job: &mut VectorizationJob,
    ) -> Result<VectorizeOutcome> {
        if force {
            tracing::info!(
                "Force mode: deleting existing points for document {}",
                doc.id
            );
            if let Err(e) = self.index.delete_by_document(collection, &doc.id.to_string()).await {
                tracing::warn!("Failed to delete existing points: {}", e);
            }
        }

        let config = ChunkingConfig::default_for(doc.category);
        let spans = chunk_text(&doc.content, &config);
        if spans.is_empty() {
            return Err(Error::EmptyChunks(doc.id.to_string()));
        }

        let total_chunks = spans.len() as u32;
        job.chunks_total = total_chunks;
        self.jobs.update(job);
        tracing::info!("Document {} chunked into {} spans", doc.id, total_chunks);

        let dimensions = self.embedder.dimensions();
        self.index
            .ensure_collection(collection, dimensions, Distance::Cosine)
            .await?;

        // Embed and upsert per batch: a failed batch is logged and counted
        // but does not abort the remaining batches. Only configuration
        // errors (dimension mismatch, rejected credentials) abort outright.
        let batch_size = self.index.upsert_batch_size().max(1);
        let created_at = Utc::now();
        let mut batch = BatchResult::default();

        for (batch_no, span_batch) in spans.chunks(batch_size).enumerate() {
            let start = batch_no * batch_size;
            let end = start + span_batch.len();

            let outcome = self
                .embed_and_upsert(doc, collection, span_batch, start, total_chunks, created_at)
                .await;

            match outcome {
                Ok(ids) => {
                    batch.succeeded_ids.extend(ids);
                    job.chunks_processed = batch.succeeded_ids.len() as u32;
                    self.jobs.update(job);
                }
                Err(e @ Error::Config(_)) => return Err(e),
                Err(e) => {
                    tracing::error!(
                        "Batch {}..{} of {} for document {} failed: {}",
                        start,
                        end,
                        total_chunks,
                        doc.id,
                        e
                    );
                    batch.failed_batches.push(crate::index::FailedBatch {
                        range: (start, end),
                        error: e.to_string(),
                    });
                }
            }
        }

        if batch.succeeded_ids.is_empty() && !batch.failed_batches.is_empty() {
            return Err(Error::vector_index(format!(
                "All {} upsert batches failed for document {}",
                batch.failed_batches.len(),
                doc.id
            )));
        }

        let processed = batch.succeeded_ids.len() as u32;

        let partial_note = if batch.is_complete() {
            None
        } else {
            let ranges: Vec<String> = batch
                .failed_batches
                .iter()
                .map(|b| format!("{}..{}: {}", b.range.0, b.range.1, b.error))
                .collect();
            tracing::warn!(
                "Document {}: {}/{} chunks upserted, failed batches: [{}]",
                doc.id,
                processed,
                total_chunks,
                ranges.join("; ")
            );
            Some(format!("failed batches: {}", ranges.join("; ")))
        };

        self.db
            .mark_vectorized(doc.id, content_hash, total_chunks, collection)?;
        self.jobs.finish(job, total_chunks, processed, partial_note);

        tracing::info!(
            "Document {} vectorized: {} chunks into '{}'",
            doc.id,
            total_chunks,
            collection
        );

        Ok(VectorizeOutcome {
            document_id: doc.id,
            skipped: false,
            chunk_count: total_chunks,
            collection_name: collection.to_string(),
            job_id: Some(job.id),
            batch: Some(batch),
        })
    }

    /// Embed one batch of spans and upsert the resulting points. Returns
    /// the point ids on success.
    async fn embed_and_upsert(
        &self,
        doc: &Document,
        collection: &str,
        span_batch: &[crate::chunking::TextSpan],
        start_index: usize,
        total_chunks: u32,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>> {
        let texts: Vec<String> = span_batch.iter().map(|s| s.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != span_batch.len() {
            return Err(Error::embedding(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                span_batch.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        for embedding in &embeddings {
            if embedding.len() != dimensions {
                return Err(Error::Config(format!(
                    "Embedding dimension {} does not match collection dimension {}",
                    embedding.len(),
                    dimensions
                )));
            }
        }

        let points: Vec<IndexPoint> = span_batch
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(offset, (span, vector))| IndexPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: PointPayload {
                    document_id: doc.id.to_string(),
                    organization_id: doc.organization_id.to_string(),
                    content: span.content.clone(),
                    content_hash: sha256_hex(&span.content),
                    chunk_index: (start_index + offset) as u32,
                    total_chunks,
                    source_type: doc.category.as_str().to_string(),
                    source_id: doc.id.to_string(),
                    semantic_tags: extract_semantic_tags(&span.content, doc.category),
                    metadata: json!({
                        "document_id": doc.id,
                        "source_title": doc.title,
                        "start_offset": span.start_offset,
                        "end_offset": span.end_offset,
                    }),
                    is_excluded: false,
                    created_at,
                },
            })
            .collect();

        let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
        self.index.upsert_batch(collection, &points).await?;
        Ok(ids)
    }

    /// Vectorize several documents sequentially, one outcome per document
    pub async fn vectorize_batch(&self, document_ids: &[Uuid], force: bool) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            total: document_ids.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            outcomes: Vec::with_capacity(document_ids.len()),
        };

        for &document_id in document_ids {
            let result = self.vectorize_document(document_id, force).await;
            match &result {
                Ok(r) if r.skipped => outcome.skipped += 1,
                Ok(_) => outcome.succeeded += 1,
                Err(_) => outcome.failed += 1,
            }
            outcome.outcomes.push((document_id, result));
        }

        tracing::info!(
            "Batch vectorization: {} succeeded, {} failed, {} skipped",
            outcome.succeeded,
            outcome.failed,
            outcome.skipped
        );
        outcome
    }

    /// Delete all of a document's points and reset its status
    pub async fn delete_document_vectors(&self, document_id: Uuid) -> Result<usize> {
        let lock = self.document_lock(document_id);
        let _lease = lock.lock().await;

        let doc = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
        let collection = collection_name(doc.organization_id, doc.category.as_str());

        let deleted = self
            .index
            .delete_by_document(&collection, &document_id.to_string())
            .await?;
        self.db.mark_vectors_deleted(document_id)?;

        tracing::info!("Deleted {} points for document {}", deleted, document_id);
        Ok(deleted)
    }

    /// Flip the soft-exclusion flag on all of a document's points. Vectors
    /// are untouched; no recomputation happens.
    pub async fn set_document_exclusion(
        &self,
        document_id: Uuid,
        excluded: bool,
    ) -> Result<usize> {
        let doc = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
        let collection = collection_name(doc.organization_id, doc.category.as_str());

        self.index
            .set_excluded(&collection, &document_id.to_string(), excluded)
            .await
    }

    /// Organization-wide stats: document status counts plus per-collection
    /// point counts
    pub async fn stats(&self, organization_id: Uuid) -> Result<RagStats> {
        let document_counts = self.db.document_status_counts(organization_id)?;

        let mut collections = std::collections::BTreeMap::new();
        let mut total_points = 0;
        for name in self
            .index
            .list_collections(&organization_prefix(organization_id))
            .await?
        {
            let count = self.index.count(&name).await?;
            total_points += count;
            collections.insert(name, count);
        }

        Ok(RagStats {
            organization_id,
            document_counts,
            collections,
            total_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchFilter;
    use crate::providers::local::{HashEmbedder, MemoryVectorIndex};
    use crate::types::SourceType;

    struct Fixture {
        vectorizer: Arc<Vectorizer>,
        db: Arc<Database>,
        embedder: Arc<HashEmbedder>,
        index: Arc<MemoryVectorIndex>,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let embedder = Arc::new(HashEmbedder::new(16));
        let index = Arc::new(MemoryVectorIndex::new());
        let jobs = Arc::new(JobTracker::new(Arc::clone(&db)));
        let vectorizer = Arc::new(Vectorizer::new(
            Arc::clone(&db),
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            jobs,
        ));
        Fixture {
            vectorizer,
            db,
            embedder,
            index,
        }
    }

    fn seed_document(db: &Database, content: &str) -> Document {
        let doc = Document::new(
            Uuid::new_v4(),
            "Lease agreement",
            SourceType::Documents,
            content,
        );
        db.insert_document(&doc).unwrap();
        doc
    }

    fn long_text() -> String {
        (0..30)
            .map(|i| format!("Paragraph {} about rent and charges for the flat.", i))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[tokio::test]
    async fn revectorizing_unchanged_document_makes_zero_provider_calls() {
        let f = fixture();
        let doc = seed_document(&f.db, &long_text());

        let first = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();
        assert!(!first.skipped);
        assert!(first.chunk_count > 1);
        let calls_after_first = f.embedder.call_count();
        assert!(calls_after_first > 0);

        let second = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.chunk_count, first.chunk_count);
        assert_eq!(f.embedder.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn chunk_indexes_are_contiguous_for_every_strategy() {
        let f = fixture();
        for category in [SourceType::Documents, SourceType::Leases, SourceType::Properties] {
            let doc = Document::new(Uuid::new_v4(), "Doc", category, long_text());
            f.db.insert_document(&doc).unwrap();
            let outcome = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();

            let collection = outcome.collection_name.clone();
            let probe = f.embedder.embed("probe").await.unwrap();
            let hits = f
                .index
                .search(&collection, &probe, &SearchFilter::default(), 1000, -1.0)
                .await
                .unwrap();

            let mut indexes: Vec<u32> = hits
                .iter()
                .filter(|h| h.payload.document_id == doc.id.to_string())
                .map(|h| h.payload.chunk_index)
                .collect();
            indexes.sort_unstable();
            let expected: Vec<u32> = (0..outcome.chunk_count).collect();
            assert_eq!(indexes, expected, "gaps in chunk_index for {:?}", category);
            for hit in &hits {
                assert_eq!(hit.payload.total_chunks, outcome.chunk_count);
            }
        }
    }

    #[tokio::test]
    async fn empty_document_fails_job_and_document() {
        let f = fixture();
        let doc = seed_document(&f.db, "   \n\n   ");

        let err = f.vectorizer.vectorize_document(doc.id, false).await;
        assert!(matches!(err, Err(Error::EmptyChunks(_))));

        let loaded = f.db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded.vectorization_status, VectorizationStatus::Error);
        assert!(loaded.vectorization_error.is_some());
    }

    #[tokio::test]
    async fn force_reindex_replaces_points() {
        let f = fixture();
        let doc = seed_document(&f.db, &long_text());

        let first = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();
        let count_before = f.index.count(&first.collection_name).await.unwrap();
        assert_eq!(count_before as u32, first.chunk_count);

        let again = f.vectorizer.vectorize_document(doc.id, true).await.unwrap();
        assert!(!again.skipped);
        let count_after = f.index.count(&again.collection_name).await.unwrap();
        assert_eq!(count_after as u32, again.chunk_count);
    }

    #[tokio::test]
    async fn exclusion_round_trip_only_toggles_the_flag() {
        let f = fixture();
        let doc = seed_document(&f.db, &long_text());
        let outcome = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();

        let updated = f
            .vectorizer
            .set_document_exclusion(doc.id, true)
            .await
            .unwrap();
        assert_eq!(updated as u32, outcome.chunk_count);

        // Excluded points are invisible to default search
        let probe = f.embedder.embed("rent").await.unwrap();
        let hits = f
            .index
            .search(
                &outcome.collection_name,
                &probe,
                &SearchFilter::default(),
                1000,
                -1.0,
            )
            .await
            .unwrap();
        assert!(hits.is_empty());

        f.vectorizer.set_document_exclusion(doc.id, false).await.unwrap();
        let hits = f
            .index
            .search(
                &outcome.collection_name,
                &probe,
                &SearchFilter::default(),
                1000,
                -1.0,
            )
            .await
            .unwrap();
        assert_eq!(hits.len() as u32, outcome.chunk_count);
        // Content and vector count unchanged by the round trip
        assert_eq!(
            f.index.count(&outcome.collection_name).await.unwrap() as u32,
            outcome.chunk_count
        );
    }

    #[tokio::test]
    async fn concurrent_vectorize_calls_serialize_per_document() {
        let f = fixture();
        let doc = seed_document(&f.db, &long_text());

        let v1 = Arc::clone(&f.vectorizer);
        let v2 = Arc::clone(&f.vectorizer);
        let (a, b) = tokio::join!(
            v1.vectorize_document(doc.id, true),
            v2.vectorize_document(doc.id, true)
        );
        let a = a.unwrap();
        let b = b.unwrap();

        // The lease serializes delete+upsert, so the index holds exactly
        // one generation of points
        let count = f.index.count(&a.collection_name).await.unwrap();
        assert_eq!(count as u32, a.chunk_count.max(b.chunk_count));
    }

    #[tokio::test]
    async fn stats_reflect_documents_and_collections() {
        let f = fixture();
        let doc = seed_document(&f.db, &long_text());
        let org = doc.organization_id;
        let outcome = f.vectorizer.vectorize_document(doc.id, false).await.unwrap();

        let stats = f.vectorizer.stats(org).await.unwrap();
        assert_eq!(stats.document_counts.get("vectorized"), Some(&1));
        assert_eq!(stats.total_points as u32, outcome.chunk_count);
        assert!(stats.collections.contains_key(&outcome.collection_name));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let f = fixture();
        let err = f.vectorizer.vectorize_document(Uuid::new_v4(), false).await;
        assert!(matches!(err, Err(Error::DocumentNotFound(_))));
    }
}
