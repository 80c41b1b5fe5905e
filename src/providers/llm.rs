//! LLM provider trait for answer generation

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

use crate::error::Result;

/// A chat message in provider-neutral form
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Stream of generated text deltas
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for completion generation, blocking or streaming.
///
/// The completion call is opaque to the rest of the system; the citation
/// contract lives in the system prompt the caller passes in.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a full completion
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Generate a streaming completion; items are text deltas
    async fn complete_stream(&self, system: &str, messages: &[ChatMessage])
        -> Result<TokenStream>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;
}
