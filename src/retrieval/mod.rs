//! Retrieval orchestrator: fans a query out across the caller-selected
//! source types and folds the results into one capped list.

use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::AdapterRegistry;
use crate::error::Result;
use crate::types::{RetrievalFilters, RetrievedSource, SourceType};

pub struct RetrievalOrchestrator {
    registry: Arc<AdapterRegistry>,
}

impl RetrievalOrchestrator {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Search the requested source types.
    ///
    /// An empty `source_types` list means NO retrieval — the absence of a
    /// selection never silently widens scope. A failing adapter is logged
    /// and skipped; the other sources still return. Result order across
    /// adapters is not a contract: results are merged in request order and
    /// capped at `limit`.
    pub async fn search_sources(
        &self,
        query: &str,
        organization_id: Uuid,
        source_types: &[SourceType],
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<RetrievedSource>> {
        if source_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();

        for &source_type in source_types {
            let Some(adapter) = self.registry.get(source_type) else {
                tracing::warn!("No adapter registered for source type {}", source_type);
                continue;
            };

            let items = match adapter.fetch(organization_id, query, filters, limit).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Fetching from {} failed: {}", source_type, e);
                    continue;
                }
            };

            for item in items {
                let content = adapter.format_for_llm(&item);
                results.push(RetrievedSource {
                    // Stable across calls so citations can be matched later,
                    // even for adapters doing direct relational fetches
                    chunk_id: format!("chunk-{}-{}", source_type, item.id),
                    document_id: item.id.clone(),
                    document_title: item.title.clone(),
                    content,
                    source_type,
                    score: item.score,
                    metadata: Some(item.data),
                });
            }
        }

        results.truncate(limit);
        Ok(results)
    }
}
