//! Source adapters: one per record category.
//!
//! Every adapter implements the same `fetch` + `format_for_llm` contract so
//! the retrieval orchestrator can fold vector search (documents), relational
//! fetches (leases, properties, tenants, owners) and the live KPI rollup
//! into one result abstraction.

pub mod documents;
pub mod kpis;
pub mod leases;
pub mod owners;
pub mod properties;
pub mod tenants;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::providers::EmbeddingProvider;
use crate::storage::Database;
use crate::types::{RetrievalFilters, SourceType};

/// Approximate token budget for one formatted source block
pub const TOKEN_BUDGET: usize = 10_000;

/// Rough conversion used for the budget: 1 token ≈ 4 characters
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended when a formatted block is cut at the budget
pub const TRUNCATION_NOTICE: &str = "\n\n[... content truncated to fit the token budget ...]";

/// Hard character truncation at the token budget. A blunt instrument, not a
/// summarizer; callers must not assume semantic completeness of the result.
pub fn truncate_to_token_budget(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(TRUNCATION_NOTICE);
    cut
}

/// One raw item produced by an adapter, before formatting
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Stable item identifier within its source type
    pub id: String,
    /// Display title
    pub title: String,
    /// Structured record data the formatter renders
    pub data: Value,
    /// Similarity for vector-search items, 1.0 for relational fetches
    pub score: f32,
}

/// Contract shared by every source adapter
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Fetch raw items for an organization, honoring entity-id filters
    async fn fetch(
        &self,
        organization_id: Uuid,
        query: &str,
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>>;

    /// Render one item as a bounded text block for the generation step
    fn format_for_llm(&self, item: &SourceItem) -> String;
}

/// Registry mapping each source type to one shared adapter, owned by the
/// retrieval orchestrator rather than living as ambient global state.
pub struct AdapterRegistry {
    adapters: HashMap<SourceType, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(
            SourceType::Documents,
            Arc::new(documents::DocumentsAdapter::new(
                embedder,
                index,
                retrieval.min_score,
            )),
        );
        adapters.insert(
            SourceType::Leases,
            Arc::new(leases::LeasesAdapter::new(Arc::clone(&db))),
        );
        adapters.insert(
            SourceType::Properties,
            Arc::new(properties::PropertiesAdapter::new(Arc::clone(&db))),
        );
        adapters.insert(
            SourceType::Kpis,
            Arc::new(kpis::KpisAdapter::new(Arc::clone(&db))),
        );
        adapters.insert(
            SourceType::Tenants,
            Arc::new(tenants::TenantsAdapter::new(Arc::clone(&db))),
        );
        adapters.insert(SourceType::Owners, Arc::new(owners::OwnersAdapter::new(db)));
        Self { adapters }
    }

    pub fn get(&self, source_type: SourceType) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&source_type)
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers shared by the card renderers
// ---------------------------------------------------------------------------

pub(crate) fn text_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("N/A")
        .to_string()
}

pub(crate) fn num_field(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

pub(crate) fn yes_no(data: &Value, key: &str) -> &'static str {
    if data.get(key).and_then(Value::as_bool).unwrap_or(false) {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_bounded_and_marked() {
        let budget_tokens = 10;
        let bound = budget_tokens * CHARS_PER_TOKEN;

        let short = truncate_to_token_budget("short text", budget_tokens);
        assert_eq!(short, "short text");

        let long_input = "x".repeat(bound * 3);
        let truncated = truncate_to_token_budget(&long_input, budget_tokens);
        assert!(truncated.ends_with(TRUNCATION_NOTICE));
        assert!(truncated.chars().count() <= bound + TRUNCATION_NOTICE.chars().count());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long_input = "é".repeat(100);
        let truncated = truncate_to_token_budget(&long_input, 10);
        assert!(truncated.starts_with(&"é".repeat(40)));
        assert!(truncated.ends_with(TRUNCATION_NOTICE));
    }
}
