use crate::types::{AppError, Backend, EmbeddingVector, Result};
use crate::utils::config::EmbeddingConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Turns query text into a dense vector.
///
/// One backend call per invocation, no retries. Empty text is rejected with
/// `InvalidInput` and text longer than the client's limit with
/// `InputTooLarge`, both before any network traffic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}

/// Embedding client backed by an Ollama server (`POST /api/embed`).
pub struct OllamaEmbedder {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    max_input_chars: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
        max_input_chars: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to build embedding HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.into(),
            max_input_chars,
        })
    }

    pub fn from_config(config: &EmbeddingConfig, max_input_chars: usize) -> Result<Self> {
        Self::new(
            &config.url,
            config.model.clone(),
            config.timeout(),
            max_input_chars,
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }
        let length = text.chars().count();
        if length > self.max_input_chars {
            return Err(AppError::InputTooLarge {
                length,
                limit: self.max_input_chars,
            });
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport(Backend::Embedding, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(Backend::Embedding, status, &body));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::from_transport(Backend::Embedding, e))?;

        let vector = body
            .embeddings
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| AppError::BackendError {
                backend: Backend::Embedding,
                status: None,
                message: "response contained no embedding".to_string(),
            })?;

        debug!(model = %self.model, dimensions = vector.len(), "Query embedded");
        Ok(EmbeddingVector::from(vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(max_input_chars: usize) -> OllamaEmbedder {
        // Port 9 (discard) is never contacted: these inputs fail validation first.
        OllamaEmbedder::new(
            "http://127.0.0.1:9/",
            "qwen3-embedding:0.6b",
            Duration::from_secs(1),
            max_input_chars,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_and_model() {
        let client = embedder(100);
        assert_eq!(client.endpoint, "http://127.0.0.1:9/api/embed");
        assert_eq!(client.model_name(), "qwen3-embedding:0.6b");
    }

    #[tokio::test]
    async fn test_rejects_blank_text() {
        let result = embedder(100).embed("   \n\t").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_rejects_oversized_text() {
        let result = embedder(5).embed("  abcdef  ").await;
        assert!(matches!(
            result,
            Err(AppError::InputTooLarge {
                length: 6,
                limit: 5
            })
        ));
    }
}
