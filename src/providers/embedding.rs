//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Replace empty or whitespace-only input with a single-space placeholder.
/// Providers reject empty strings.
pub fn sanitize_input(text: &str) -> &str {
    if text.trim().is_empty() {
        " "
    } else {
        text
    }
}

/// Trait for generating text embeddings.
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI-compatible HTTP API
/// - `HashEmbedder`: deterministic vectors for tests and offline runs
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving order.
    ///
    /// The default implementation calls `embed` sequentially; providers
    /// with native batch endpoints should override and re-batch at
    /// `max_batch_size`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Fixed vector dimensionality for this model. Must equal the dimension
    /// the target collection was created with; a mismatch is a fatal
    /// configuration error.
    fn dimensions(&self) -> usize;

    /// Provider-imposed maximum texts per call
    fn max_batch_size(&self) -> usize {
        100
    }

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
