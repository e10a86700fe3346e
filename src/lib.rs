//! # docqa - documentation question answering
//!
//! A Retrieval-Augmented Generation server that answers natural-language
//! questions about a product's documentation. The question is embedded,
//! relevant chunks are retrieved from a vector index, packed into a bounded
//! context and handed to an LLM with instructions to answer from that context
//! only.
//!
//! ## Overview
//!
//! docqa can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `docqa-server` binary
//! 2. **As a library** - Build a [`RagPipeline`] over your own backends
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use docqa::{DocqaConfig, RagPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DocqaConfig::load("docqa.toml")?;
//!     let api_key = config.generation_api_key()?;
//!
//!     let pipeline = RagPipeline::from_config(&config, api_key, None).await?;
//!     pipeline.verify_dimensions().await?;
//!
//!     let answer = pipeline.answer("What is the reset procedure?", "req-1").await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```
//!
//! ### Custom Backends
//!
//! Every backend sits behind a trait ([`EmbeddingClient`], [`VectorStore`],
//! [`LLMClient`], [`AuditLog`]), so any of them can be swapped:
//!
//! ```rust,ignore
//! use docqa::{PipelineSettings, RagPipeline};
//! use std::sync::Arc;
//!
//! let pipeline = RagPipeline::new(
//!     Arc::new(my_embedder),
//!     Arc::new(my_store),
//!     Arc::new(my_llm),
//!     PipelineSettings::default(),
//! );
//! ```
//!
//! ## Modules
//!
//! - [`rag`] - The pipeline: embedding, context assembly, prompts, retries
//! - [`db`] - Qdrant vector search and the libsql audit log
//! - [`llm`] - OpenAI-compatible generation client
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and telemetry

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Vector search and audit log storage.
pub mod db;
/// Generation backend clients.
pub mod llm;
/// Retrieval Augmented Generation pipeline.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and telemetry.
pub mod utils;

pub use db::{AuditLog, NoopAuditLog, QdrantVectorStore, TursoAuditLog, VectorStore};
pub use llm::{LLMClient, OpenAIClient};
pub use rag::{EmbeddingClient, OllamaEmbedder, PipelineSettings, RagPipeline};
pub use types::{AppError, Result};
pub use utils::config::DocqaConfig;

use std::sync::Arc;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub audit: Arc<dyn AuditLog>,
}
