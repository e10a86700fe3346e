//! Generation backend clients
//!
//! - [`LLMClient`] - The trait the orchestrator calls to turn a prompt into text
//! - [`OpenAIClient`] - OpenAI-compatible chat completions (OpenRouter by default)
//!
//! # Example
//!
//! ```ignore
//! use docqa::llm::{LLMClient, OpenAIClient};
//! use docqa::types::Prompt;
//!
//! let client = OpenAIClient::from_config(&config.generation, api_key)?;
//! let text = client.generate(&Prompt::new(system, question)).await?;
//! ```

/// Core generation client trait.
pub mod client;
/// OpenAI-compatible chat completions client.
pub mod openai;

pub use client::LLMClient;
pub use openai::OpenAIClient;
