//! Documents adapter: the only adapter that performs true vector search.
//!
//! Embeds the query and searches the organization's `documents` collection,
//! skipping soft-excluded points.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::index::{collection_name, SearchFilter, VectorIndex};
use crate::providers::EmbeddingProvider;
use crate::types::{RetrievalFilters, SourceType};

use super::{text_field, truncate_to_token_budget, SourceAdapter, SourceItem, TOKEN_BUDGET};

pub struct DocumentsAdapter {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    min_score: f32,
}

impl DocumentsAdapter {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            min_score,
        }
    }
}

#[async_trait]
impl SourceAdapter for DocumentsAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Documents
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        query: &str,
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let query_embedding = self.embedder.embed(query).await?;
        let collection = collection_name(organization_id, SourceType::Documents.as_str());

        let filter = SearchFilter {
            organization_id: Some(organization_id.to_string()),
            source_types: None,
            document_ids: filters
                .document_ids
                .as_ref()
                .map(|ids| ids.iter().map(Uuid::to_string).collect()),
            include_excluded: false,
        };

        let hits = self
            .index
            .search(&collection, &query_embedding, &filter, limit, self.min_score)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let title = hit
                    .payload
                    .metadata
                    .get("source_title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Untitled document")
                    .to_string();
                SourceItem {
                    id: hit.id.clone(),
                    title: title.clone(),
                    data: json!({
                        "title": title,
                        "content": hit.payload.content,
                        "document_id": hit.payload.document_id,
                        "chunk_index": hit.payload.chunk_index,
                        "semantic_tags": hit.payload.semantic_tags,
                    }),
                    score: hit.score,
                }
            })
            .collect())
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let formatted = format!(
            "# Document: {title}\n\n\
             **Relevance**: {score:.0}%\n\n\
             ## Content\n{content}\n",
            title = item.title,
            score = item.score * 100.0,
            content = text_field(&item.data, "content"),
        );
        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
