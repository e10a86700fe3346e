//! Startup configuration for docqa
//!
//! Settings are read from an optional TOML file (`docqa.toml` by default) and
//! then overridden by `DOCQA__<SECTION>__<KEY>` environment variables, e.g.
//! `DOCQA__RAG__TOP_K=20`. Secrets are never stored in the file; the file
//! names the environment variable that holds them (`api_key_env`).
//!
//! Everything is validated once at startup: an invalid threshold or a zero
//! top-K stops the process instead of failing individual requests.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DOCQA";

/// Hard upper bound on `rag.top_k`.
pub const MAX_TOP_K: usize = 50;

/// Root configuration structure loaded from docqa.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocqaConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// ============= Embedding Backend =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama server URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "qwen3-embedding:0.6b".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

// ============= Vector Store =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Qdrant REST URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Environment variable containing the Qdrant API key, if the server requires one
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Payload field holding the chunk text
    #[serde(default = "default_text_field")]
    pub text_field: String,

    /// Payload field holding the chunk's source document
    #[serde(default = "default_source_field")]
    pub source_field: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "safemobile_docs".to_string()
}

fn default_text_field() -> String {
    "text".to_string()
}

fn default_source_field() -> String {
    "source".to_string()
}

fn default_search_timeout() -> u64 {
    10
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key_env: None,
            text_field: default_text_field(),
            source_field: default_source_field(),
            timeout_secs: default_search_timeout(),
        }
    }
}

// ============= Generation Backend =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_generation_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_generation_model() -> String {
    "openai/gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_generation_timeout() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_generation_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for rate-limited generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total generation attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity score, passed to the vector index as a filter
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Maximum size of the assembled context, in characters
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// Questions longer than this are rejected before any backend call
    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,

    /// Optional preamble placed before the grounding instruction
    #[serde(default)]
    pub persona: Option<String>,

    /// Reply used when no chunk clears the score threshold
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_top_k() -> usize {
    15
}

fn default_score_threshold() -> f32 {
    0.3
}

fn default_context_budget() -> usize {
    12_000
}

fn default_max_question_chars() -> usize {
    4_000
}

fn default_fallback_answer() -> String {
    "Sorry, I could not find relevant information in the documentation to answer your question."
        .to_string()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            context_budget_chars: default_context_budget(),
            max_question_chars: default_max_question_chars(),
            persona: None,
            fallback_answer: default_fallback_answer(),
        }
    }
}

// ============= Audit Log =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Local SQLite path or a `libsql://` Turso URL
    #[serde(default = "default_audit_url")]
    pub url: String,

    /// Environment variable with the Turso auth token (remote URLs only)
    #[serde(default)]
    pub auth_token_env: Option<String>,

    #[serde(default = "default_audit_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_audit_url() -> String {
    "./data/audit.db".to_string()
}

fn default_audit_timeout() -> u64 {
    5
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_audit_url(),
            auth_token_env: None,
            timeout_secs: default_audit_timeout(),
        }
    }
}

impl AuditConfig {
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("libsql://")
            || self.url.starts_with("https://")
            || self.url.starts_with("http://")
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl DocqaConfig {
    /// Load configuration from a TOML file (optional) plus environment overrides,
    /// then validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DocqaConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text, without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;

        let config: DocqaConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Validate ranges and URLs. Secrets are checked separately by the accessors
    /// below, since they depend on the process environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.top_k == 0 || rag.top_k > MAX_TOP_K {
            return Err(ConfigError::ValidationError(format!(
                "rag.top_k must be between 1 and {}, got {}",
                MAX_TOP_K, rag.top_k
            )));
        }
        if !rag.score_threshold.is_finite() || !(0.0..=1.0).contains(&rag.score_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "rag.score_threshold must be within [0, 1], got {}",
                rag.score_threshold
            )));
        }
        if rag.context_budget_chars == 0 {
            return Err(ConfigError::ValidationError(
                "rag.context_budget_chars must be positive".to_string(),
            ));
        }
        if rag.max_question_chars == 0 {
            return Err(ConfigError::ValidationError(
                "rag.max_question_chars must be positive".to_string(),
            ));
        }
        if rag.fallback_answer.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "rag.fallback_answer must not be empty".to_string(),
            ));
        }

        let retry = &self.generation.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "generation.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if retry.max_backoff_ms < retry.backoff_base_ms {
            return Err(ConfigError::ValidationError(format!(
                "generation.retry.max_backoff_ms ({}) is smaller than backoff_base_ms ({})",
                retry.max_backoff_ms, retry.backoff_base_ms
            )));
        }
        if let Some(temperature) = self.generation.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.temperature must be within [0, 2], got {}",
                    temperature
                )));
            }
        }

        for (name, timeout) in [
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("vector_store.timeout_secs", self.vector_store.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
            ("audit.timeout_secs", self.audit.timeout_secs),
        ] {
            if timeout == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        for (name, url) in [
            ("embedding.url", &self.embedding.url),
            ("vector_store.url", &self.vector_store.url),
            ("generation.base_url", &self.generation.base_url),
        ] {
            validate_http_url(name, url)?;
        }

        for (name, value) in [
            ("embedding.model", &self.embedding.model),
            ("vector_store.collection", &self.vector_store.collection),
            ("generation.model", &self.generation.model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Resolve the generation API key from the environment.
    pub fn generation_api_key(&self) -> Result<String, ConfigError> {
        resolve_env(&self.generation.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.generation.api_key_env.clone()))
    }

    /// Resolve the optional vector store API key.
    pub fn vector_store_api_key(&self) -> Result<Option<String>, ConfigError> {
        match &self.vector_store.api_key_env {
            Some(env) => resolve_env(env)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(env.clone())),
            None => Ok(None),
        }
    }

    /// Resolve the Turso auth token when the audit log points at a remote database.
    pub fn audit_auth_token(&self) -> Result<Option<String>, ConfigError> {
        match &self.audit.auth_token_env {
            Some(env) => resolve_env(env)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(env.clone())),
            None => Ok(None),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn resolve_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| {
        ConfigError::ValidationError(format!("{} is not a valid URL ({}): {}", name, url, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "{} must use http or https, got {}",
            name, url
        )));
    }
    Ok(())
}
