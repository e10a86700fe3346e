//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! Answers questions about product documentation from chunks stored in a
//! vector index.
//!
//! # Module Structure
//!
//! - [`rag::embeddings`](crate::rag::embeddings) - Query embedding (Ollama)
//! - [`rag::context`](crate::rag::context) - Deduplication and budgeted context assembly
//! - [`rag::prompt`](crate::rag::prompt) - Grounded system/user prompt construction
//! - [`rag::retry`](crate::rag::retry) - Backoff policy for rate-limited generation
//! - [`rag::pipeline`](crate::rag::pipeline) - The orchestrator tying it all together
//!
//! # Request Flow
//!
//! 1. **Validate** - Empty or oversized questions are rejected up front
//! 2. **Embed** - The question becomes a query vector
//! 3. **Search** - The index returns chunks above the score threshold
//! 4. **Assemble** - Chunks are deduplicated and packed into the context budget
//! 5. **Generate** - The model answers from the assembled context only
//!
//! When step 4 yields nothing, a fixed fallback answer is returned and the
//! model is never called.
//!
//! # Example
//!
//! ```ignore
//! use docqa::rag::RagPipeline;
//!
//! let pipeline = RagPipeline::from_config(&config, api_key, None).await?;
//! pipeline.verify_dimensions().await?;
//!
//! let answer = pipeline.answer("What is the reset procedure?", "req-1").await?;
//! println!("{} ({} chunks)", answer.text, answer.metadata.chunk_count);
//! ```

pub mod context;
pub mod embeddings;
pub mod pipeline;
pub mod prompt;
pub mod retry;

pub use context::assemble;
pub use embeddings::{EmbeddingClient, OllamaEmbedder};
pub use pipeline::{PipelineSettings, RagPipeline};
pub use prompt::{PromptBuilder, GROUNDING_INSTRUCTION};
pub use retry::RetryPolicy;
