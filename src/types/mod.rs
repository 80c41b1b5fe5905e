//! Core data types: documents, jobs, records, requests and responses

pub mod document;
pub mod job;
pub mod query;
pub mod records;
pub mod response;
pub mod source;

pub use document::{Document, VectorizationStatus};
pub use job::{JobStatus, VectorizationJob};
pub use query::{ChatMode, ChatRequest, RetrievalFilters, SearchRequest};
pub use records::{Lease, Owner, Property, Tenant};
pub use response::{Citation, RetrievedSource, StreamEvent};
pub use source::SourceType;
