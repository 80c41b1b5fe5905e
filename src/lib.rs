//! estate-rag: multi-tenant RAG over property-management records
//!
//! Turns organizational records (uploaded documents, leases, properties,
//! tenants, owners, portfolio KPIs) into a tenant-scoped vector index and
//! answers natural-language questions with citations that are verified
//! against what the generator actually referenced.

pub mod adapters;
pub mod chunking;
pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;
pub mod vectorization;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Document, VectorizationStatus},
    query::{ChatMode, ChatRequest, SearchRequest},
    response::{Citation, StreamEvent},
    source::SourceType,
};
