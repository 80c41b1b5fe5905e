//! Metadata store: documents, jobs, relational records and chat history

pub mod database;

pub use database::Database;
