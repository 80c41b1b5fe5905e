//! Request types for chat and retrieval

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::SourceType;

/// Chat mode, controlling whether and how retrieval feeds generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Plain generation, no retrieval
    Normal,
    /// Retrieved results are rendered directly, no generation
    RagOnly,
    /// Retrieval feeds generation; citations verified against markers
    RagEnhanced,
}

impl Default for ChatMode {
    fn default() -> Self {
        ChatMode::Normal
    }
}

/// Entity-id filters narrowing what adapters fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalFilters {
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub lease_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub property_ids: Option<Vec<Uuid>>,
}

impl RetrievalFilters {
    pub fn is_empty(&self) -> bool {
        self.document_ids.is_none() && self.lease_ids.is_none() && self.property_ids.is_none()
    }
}

/// A chat turn request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Uuid,
    /// Organization scope; membership checks happen upstream
    pub organization_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub mode: ChatMode,
    /// Caller-selected source allow-list. An empty list means NO retrieval;
    /// absence of a selection never widens scope. Unknown tokens are
    /// skipped.
    #[serde(default)]
    pub requested_sources: Vec<String>,
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub lease_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub property_ids: Option<Vec<Uuid>>,
}

impl ChatRequest {
    /// Resolve the requested source tokens into the closed enum, dropping
    /// anything unknown.
    pub fn requested_sources(&self) -> Vec<SourceType> {
        let mut sources = Vec::new();
        for token in &self.requested_sources {
            match SourceType::parse(token) {
                Some(st) if !sources.contains(&st) => sources.push(st),
                Some(_) => {}
                None => tracing::debug!("Ignoring unknown source type: {}", token),
            }
        }
        sources
    }

    pub fn filters(&self) -> RetrievalFilters {
        RetrievalFilters {
            document_ids: self.document_ids.clone(),
            lease_ids: self.lease_ids.clone(),
            property_ids: self.property_ids.clone(),
        }
    }
}

/// Retrieval-only multi-source search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub organization_id: Uuid,
    /// Explicit allow-list; empty means no retrieval
    #[serde(default)]
    pub source_types: Vec<SourceType>,
    #[serde(default)]
    pub document_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub lease_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub property_ids: Option<Vec<Uuid>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

impl SearchRequest {
    pub fn filters(&self) -> RetrievalFilters {
        RetrievalFilters {
            document_ids: self.document_ids.clone(),
            lease_ids: self.lease_ids.clone(),
            property_ids: self.property_ids.clone(),
        }
    }
}
