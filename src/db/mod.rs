//! Storage adapters
//!
//! - [`VectorStore`] / [`QdrantVectorStore`] - similarity search over documentation chunks
//! - [`AuditLog`] / [`TursoAuditLog`] - record of answered questions and user feedback

pub mod audit;
pub mod qdrant;
pub mod turso;
pub mod vectorstore;

pub use audit::{open_audit_log, AuditLog, NoopAuditLog};
pub use qdrant::{QdrantVectorStore, VectorLayout};
pub use turso::{AuditRecord, TursoAuditLog};
pub use vectorstore::VectorStore;
