//! Provider abstractions for embeddings and completions.
//!
//! Both are injected interfaces constructed once per process, so backends
//! can be swapped and tests can run against deterministic fakes.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod openai;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LlmProvider, TokenStream};
