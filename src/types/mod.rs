use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    pub request_id: String,
    pub answer: String,
    pub metadata: AnswerMetadata,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub request_id: String,
    /// Whether the user found the answer correct
    pub helpful: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    /// False when the request is unknown or feedback was already given
    pub updated: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============= Query Types =============

/// A single user question. Immutable for the lifetime of one request.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub request_id: String,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_id: request_id.into(),
            received_at: Utc::now(),
        }
    }
}

// ============= RAG Types =============

/// Dense embedding of a piece of text. The dimensionality is fixed by the
/// embedding model and must match the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A documentation chunk returned by the vector index for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Chunks selected for a prompt, together with the rendered context block.
///
/// Built by [`crate::rag::context::assemble`], which guarantees that the
/// chunks keep their descending score order, carry unique identifiers and
/// that the text never exceeds the character budget it was assembled with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    chunks: Vec<RetrievedChunk>,
    text: String,
}

impl AssembledContext {
    pub(crate) fn new(chunks: Vec<RetrievedChunk>, text: String) -> Self {
        Self { chunks, text }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[RetrievedChunk] {
        &self.chunks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Length of the rendered text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.chunks.first().map(|chunk| chunk.score)
    }

    pub fn average_score(&self) -> Option<f32> {
        if self.chunks.is_empty() {
            return None;
        }
        let total: f32 = self.chunks.iter().map(|chunk| chunk.score).sum();
        Some(total / self.chunks.len() as f32)
    }

    pub fn sources(&self) -> Vec<String> {
        self.chunks.iter().map(|chunk| chunk.source.clone()).collect()
    }

    pub fn chunk_scores(&self) -> Vec<ChunkScore> {
        self.chunks
            .iter()
            .map(|chunk| ChunkScore {
                id: chunk.id.clone(),
                score: chunk.score,
            })
            .collect()
    }
}

// ============= Prompt Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Message sequence sent to the generation backend: exactly one system
/// message followed by exactly one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    messages: [PromptMessage; 2],
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: [
                PromptMessage {
                    role: MessageRole::System,
                    content: system.into(),
                },
                PromptMessage {
                    role: MessageRole::User,
                    content: user.into(),
                },
            ],
        }
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    pub fn system(&self) -> &str {
        &self.messages[0].content
    }

    pub fn user(&self) -> &str {
        &self.messages[1].content
    }
}

// ============= Answer Types =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnswerMetadata {
    /// Number of chunks placed in the prompt
    pub chunk_count: usize,
    /// Highest relevance score among the chunks used
    pub top_score: Option<f32>,
    /// Mean relevance score of the chunks used
    pub average_score: Option<f32>,
    /// Source identifiers of the chunks used, in prompt order
    pub sources: Vec<String>,
    /// True when no grounding evidence was found and the fixed answer was returned
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub metadata: AnswerMetadata,
}

impl Answer {
    pub fn grounded(text: String, context: &AssembledContext) -> Self {
        Self {
            text,
            metadata: AnswerMetadata {
                chunk_count: context.len(),
                top_score: context.top_score(),
                average_score: context.average_score(),
                sources: context.sources(),
                fallback: false,
            },
        }
    }

    pub fn fallback(text: String) -> Self {
        Self {
            text,
            metadata: AnswerMetadata {
                chunk_count: 0,
                top_score: None,
                average_score: None,
                sources: Vec::new(),
                fallback: true,
            },
        }
    }
}

// ============= Audit Types =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkScore {
    pub id: String,
    pub score: f32,
}

/// Record handed to the audit log once a request has been answered.
///
/// Fallback answers never reach the generation backend, so they carry no
/// prompt, no raw completion and no chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub request_id: String,
    pub question: String,
    pub answer: String,
    pub chunk_count: usize,
    pub top_score: Option<f32>,
    pub average_score: Option<f32>,
    pub fallback: bool,
    /// Chunks placed in the prompt, in prompt order
    pub chunks: Vec<ChunkScore>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    /// Completion exactly as returned by the generation backend
    pub raw_response: Option<String>,
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|chunk| chunk.id.as_str()).collect()
    }
}

// ============= Error Types =============

/// External service a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Embedding,
    VectorSearch,
    Generation,
    AuditLog,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Embedding => "embedding",
            Backend::VectorSearch => "vector search",
            Backend::Generation => "generation",
            Backend::AuditLog => "audit log",
        };
        write!(f, "{}", name)
    }
}

/// Coarse classification of [`AppError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    BackendUnavailable,
    BackendError,
    RateLimited,
    DimensionMismatch,
    EmptyResponse,
    Configuration,
    Database,
    Internal,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input too large: {length} characters exceeds the limit of {limit}")]
    InputTooLarge { length: usize, limit: usize },

    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable { backend: Backend, message: String },

    #[error("{backend} backend error: {message}")]
    BackendError {
        backend: Backend,
        status: Option<u16>,
        message: String,
    },

    #[error("Generation backend rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Generation backend returned no usable text")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) | AppError::InputTooLarge { .. } => ErrorKind::Input,
            AppError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            AppError::BackendError { .. } => ErrorKind::BackendError,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            AppError::EmptyResponse => ErrorKind::EmptyResponse,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Database(_) => ErrorKind::Database,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_input_error(&self) -> bool {
        self.kind() == ErrorKind::Input
    }

    /// Map a transport-level reqwest failure. Timeouts and connection
    /// failures count as the backend being unavailable.
    pub fn from_transport(backend: Backend, err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::BackendError {
                backend,
                status: None,
                message: format!("malformed response: {}", err),
            }
        } else if let Some(status) = err.status() {
            AppError::BackendError {
                backend,
                status: Some(status.as_u16()),
                message: err.to_string(),
            }
        } else {
            AppError::BackendUnavailable {
                backend,
                message: err.to_string(),
            }
        }
    }

    /// Non-success HTTP status returned by a backend.
    pub fn from_status(backend: Backend, status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            format!("HTTP {}: {}", status.as_u16(), truncate(body, 512))
        };
        AppError::BackendError {
            backend,
            status: Some(status.as_u16()),
            message,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self.kind() {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::BackendError | ErrorKind::EmptyResponse => StatusCode::BAD_GATEWAY,
            ErrorKind::DimensionMismatch
            | ErrorKind::Configuration
            | ErrorKind::Database
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
