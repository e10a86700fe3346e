//! Generation client abstraction
//!
//! The pipeline only needs one capability from a language model: turn a
//! grounded [`Prompt`] into answer text. Providers implement [`LLMClient`] and
//! report failures through the shared [`AppError`] taxonomy so the
//! orchestrator can tell a rate limit (retry) from anything else (surface).
//!
//! [`AppError`]: crate::types::AppError

use crate::types::{Prompt, Result};
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// Implementations make exactly one backend call per invocation and never
/// retry on their own. They must return:
/// - `AppError::RateLimited` when the backend asks the caller to back off
/// - `AppError::EmptyResponse` when the backend answers without usable text
/// - `AppError::BackendUnavailable` on connection failures and timeouts
/// - `AppError::BackendError` for every other non-success response
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate answer text for a prompt
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}
