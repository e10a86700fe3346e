use crate::db::audit::{AuditLog, NoopAuditLog};
use crate::db::qdrant::QdrantVectorStore;
use crate::db::vectorstore::VectorStore;
use crate::llm::client::LLMClient;
use crate::llm::openai::OpenAIClient;
use crate::rag::context::assemble;
use crate::rag::embeddings::{EmbeddingClient, OllamaEmbedder};
use crate::rag::prompt::PromptBuilder;
use crate::rag::retry::RetryPolicy;
use crate::types::{
    AppError, AssembledContext, Answer, AuditEvent, ChunkScore, EmbeddingVector, Prompt, Query,
    Result, RetrievedChunk,
};
use crate::utils::config::{DocqaConfig, RagConfig};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Text embedded once at startup to learn the model's dimensionality.
const DIMENSION_SAMPLE_TEXT: &str = "dimension check";

/// Per-request knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub score_threshold: f32,
    pub context_budget_chars: usize,
    pub max_question_chars: usize,
    pub fallback_answer: String,
    pub retry: RetryPolicy,
    pub audit_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let rag = RagConfig::default();
        Self {
            top_k: rag.top_k,
            score_threshold: rag.score_threshold,
            context_budget_chars: rag.context_budget_chars,
            max_question_chars: rag.max_question_chars,
            fallback_answer: rag.fallback_answer,
            retry: RetryPolicy::default(),
            audit_timeout: Duration::from_secs(5),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &DocqaConfig) -> Self {
        Self {
            top_k: config.rag.top_k,
            score_threshold: config.rag.score_threshold,
            context_budget_chars: config.rag.context_budget_chars,
            max_question_chars: config.rag.max_question_chars,
            fallback_answer: config.rag.fallback_answer.clone(),
            retry: RetryPolicy::from_config(&config.generation.retry),
            audit_timeout: config.audit.timeout(),
        }
    }
}

/// Where a request currently is. `Done`, `Fallback` and `Errored` end the request.
enum Stage {
    Embedding,
    Searching(EmbeddingVector),
    Assembling(Vec<RetrievedChunk>),
    Generating(AssembledContext),
    Done { answer: Answer, trace: GenerationTrace },
    Fallback,
    Errored { stage: &'static str, error: AppError },
}

/// What was sent to and received from the generation backend for one answer.
struct GenerationTrace {
    prompt: Prompt,
    raw_response: String,
    chunks: Vec<ChunkScore>,
}

/// Question answering over the documentation index.
///
/// Holds only shared, immutable clients, so one instance serves any number
/// of concurrent requests.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LLMClient>,
    audit: Arc<dyn AuditLog>,
    prompts: PromptBuilder,
    settings: PipelineSettings,
    model: Option<String>,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LLMClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            audit: Arc::new(NoopAuditLog),
            prompts: PromptBuilder::default(),
            settings,
            model: None,
        }
    }

    /// Build the pipeline from configuration with the concrete Ollama, Qdrant
    /// and OpenAI-compatible clients. Contacts Qdrant once to learn the
    /// collection's vector size.
    pub async fn from_config(
        config: &DocqaConfig,
        api_key: String,
        vector_store_api_key: Option<String>,
    ) -> Result<Self> {
        let embedder = OllamaEmbedder::from_config(&config.embedding, config.rag.max_question_chars)?;

        let store = QdrantVectorStore::from_config(&config.vector_store, vector_store_api_key)?;
        let layout = store.describe().await?;
        let dimensions = layout.size;
        let store = store.with_layout(layout);

        let llm = OpenAIClient::from_config(&config.generation, api_key)?;
        let model = llm.model_name().to_string();

        info!(
            embedding_model = %embedder.model_name(),
            collection = %store.collection(),
            dimensions,
            generation_model = %model,
            "RAG pipeline configured"
        );

        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(llm),
            PipelineSettings::from_config(config),
        )
        .with_prompt_builder(PromptBuilder::new().with_persona(config.rag.persona.clone()))
        .with_model_name(model))
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Check that the embedding model and the index agree on dimensionality.
    pub async fn verify_dimensions(&self) -> Result<usize> {
        let expected = self.store.dimensions().await?;
        let sample = self.embedder.embed(DIMENSION_SAMPLE_TEXT).await?;

        if sample.dimensions() != expected {
            return Err(AppError::DimensionMismatch {
                expected,
                actual: sample.dimensions(),
            });
        }

        info!(dimensions = expected, "Embedding and index dimensions match");
        Ok(expected)
    }

    /// Answer one question.
    ///
    /// Returns the fallback answer (not an error) when nothing relevant is
    /// found. Only rate-limited generation calls are retried.
    #[instrument(name = "rag.answer", skip(self, question), fields(question_chars = question.chars().count()))]
    pub async fn answer(&self, question: &str, request_id: &str) -> Result<Answer> {
        self.validate_question(question)?;
        let query = Query::new(question, request_id);

        let mut stage = Stage::Embedding;
        loop {
            stage = match stage {
                Stage::Embedding => match self.embedder.embed(&query.text).await {
                    Ok(vector) => Stage::Searching(vector),
                    Err(error) => Stage::Errored {
                        stage: "embedding",
                        error,
                    },
                },

                Stage::Searching(vector) => {
                    match self
                        .store
                        .search(&vector, self.settings.top_k, self.settings.score_threshold)
                        .await
                    {
                        Ok(chunks) => Stage::Assembling(chunks),
                        Err(error) => Stage::Errored {
                            stage: "search",
                            error,
                        },
                    }
                }

                Stage::Assembling(chunks) => {
                    let context = assemble(&chunks, self.settings.context_budget_chars);
                    if context.is_empty() {
                        Stage::Fallback
                    } else {
                        debug!(
                            retrieved = chunks.len(),
                            chunks = context.len(),
                            chars = context.char_count(),
                            "Context ready"
                        );
                        Stage::Generating(context)
                    }
                }

                Stage::Generating(context) => {
                    let prompt = self.prompts.build(&context, &query);
                    match self.generate_with_retry(&prompt).await {
                        Ok(raw_response) => Stage::Done {
                            answer: Answer::grounded(
                                raw_response.trim().to_string(),
                                &context,
                            ),
                            trace: GenerationTrace {
                                prompt,
                                raw_response,
                                chunks: context.chunk_scores(),
                            },
                        },
                        Err(error) => Stage::Errored {
                            stage: "generation",
                            error,
                        },
                    }
                }

                Stage::Done { answer, trace } => {
                    info!(
                        chunks = answer.metadata.chunk_count,
                        top_score = ?answer.metadata.top_score,
                        "Answer generated"
                    );
                    self.spawn_audit(&query, &answer, Some(trace));
                    return Ok(answer);
                }

                Stage::Fallback => {
                    info!(
                        threshold = self.settings.score_threshold,
                        "No relevant chunks, returning fallback answer"
                    );
                    let answer = Answer::fallback(self.settings.fallback_answer.clone());
                    self.spawn_audit(&query, &answer, None);
                    return Ok(answer);
                }

                Stage::Errored { stage, error } => {
                    warn!(stage, kind = ?error.kind(), error = %error, "Request failed");
                    return Err(error);
                }
            };
        }
    }

    fn validate_question(&self, question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(AppError::InvalidInput("question must not be empty".to_string()));
        }
        let length = question.chars().count();
        if length > self.settings.max_question_chars {
            return Err(AppError::InputTooLarge {
                length,
                limit: self.settings.max_question_chars,
            });
        }
        Ok(())
    }

    async fn generate_with_retry(&self, prompt: &Prompt) -> Result<String> {
        let policy = self.settings.retry;
        let mut attempt = 1;

        loop {
            match self.llm.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(AppError::RateLimited { retry_after }) if policy.can_retry(attempt) => {
                    let delay = policy.delay_for(attempt, retry_after);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay = ?delay,
                        "Generation rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn spawn_audit(&self, query: &Query, answer: &Answer, trace: Option<GenerationTrace>) {
        let (chunks, system_prompt, user_prompt, raw_response) = match trace {
            Some(trace) => (
                trace.chunks,
                Some(trace.prompt.system().to_string()),
                Some(trace.prompt.user().to_string()),
                Some(trace.raw_response),
            ),
            None => (Vec::new(), None, None, None),
        };

        let event = AuditEvent {
            request_id: query.request_id.clone(),
            question: query.text.clone(),
            answer: answer.text.clone(),
            chunk_count: answer.metadata.chunk_count,
            top_score: answer.metadata.top_score,
            average_score: answer.metadata.average_score,
            fallback: answer.metadata.fallback,
            chunks,
            system_prompt,
            user_prompt,
            raw_response,
            model: self.model.clone(),
            timestamp: Utc::now(),
        };

        let audit = Arc::clone(&self.audit);
        let timeout = self.settings.audit_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, audit.record(&event)).await {
                Ok(Ok(())) => debug!(request_id = %event.request_id, "Audit event recorded"),
                Ok(Err(e)) => {
                    warn!(request_id = %event.request_id, error = %e, "Failed to record audit event")
                }
                Err(_) => warn!(
                    request_id = %event.request_id,
                    timeout = ?timeout,
                    "Audit write timed out"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::vectorstore::MockVectorStore;
    use crate::llm::client::MockLLMClient;
    use crate::rag::embeddings::MockEmbeddingClient;
    use crate::types::Backend;

    fn chunk(id: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            text: format!("Documentation text for {}", id),
            source: format!("{}.md", id),
            score,
        }
    }

    fn embedder(times: usize) -> MockEmbeddingClient {
        let mut embedder = MockEmbeddingClient::new();
        embedder
            .expect_embed()
            .times(times)
            .returning(|_| Ok(EmbeddingVector::from(vec![0.1, 0.2, 0.3])));
        embedder
    }

    fn store(times: usize, chunks: Vec<RetrievedChunk>) -> MockVectorStore {
        let mut store = MockVectorStore::new();
        store
            .expect_search()
            .times(times)
            .returning(move |_, _, _| Ok(chunks.clone()));
        store
    }

    fn pipeline(
        embedder: MockEmbeddingClient,
        store: MockVectorStore,
        llm: MockLLMClient,
    ) -> RagPipeline {
        RagPipeline::new(
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(llm),
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_grounded_answer() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| Ok("Hold the power button.".to_string()));

        let pipeline = pipeline(
            embedder(1),
            store(1, vec![chunk("doc-reset-1", 0.81), chunk("doc-reset-2", 0.62)]),
            llm,
        );

        let answer = pipeline
            .answer("What is the reset procedure?", "req-1")
            .await
            .unwrap();
        assert_eq!(answer.text, "Hold the power button.");
        assert_eq!(answer.metadata.chunk_count, 2);
        assert_eq!(answer.metadata.top_score, Some(0.81));
        assert!(!answer.metadata.fallback);
    }

    #[tokio::test]
    async fn test_no_chunks_falls_back_without_generation() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate().times(0);

        let pipeline = pipeline(embedder(1), store(1, Vec::new()), llm);
        let answer = pipeline.answer("Unrelated question", "req-2").await.unwrap();

        assert!(answer.metadata.fallback);
        assert_eq!(answer.metadata.chunk_count, 0);
        assert_eq!(answer.text, PipelineSettings::default().fallback_answer);
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_backend_calls() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate().times(0);

        let pipeline = pipeline(embedder(0), store(0, Vec::new()), llm);
        let result = pipeline.answer("   ", "req-3").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_oversized_question_makes_no_backend_calls() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate().times(0);

        let pipeline = pipeline(embedder(0), store(0, Vec::new()), llm);
        let question = "a".repeat(PipelineSettings::default().max_question_chars + 1);
        let result = pipeline.answer(&question, "req-4").await;
        assert!(matches!(result, Err(AppError::InputTooLarge { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let mut llm = MockLLMClient::new();
        let mut calls = 0;
        llm.expect_generate().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(AppError::RateLimited { retry_after: None })
            } else {
                Ok("answer after backoff".to_string())
            }
        });

        let pipeline = pipeline(embedder(1), store(1, vec![chunk("a", 0.9)]), llm);
        let answer = pipeline.answer("question", "req-5").await.unwrap();
        assert_eq!(answer.text, "answer after backoff");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_attempts() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate()
            .times(3)
            .returning(|_| Err(AppError::RateLimited { retry_after: None }));

        let pipeline = pipeline(embedder(1), store(1, vec![chunk("a", 0.9)]), llm);
        let result = pipeline.answer("question", "req-6").await;
        assert!(matches!(result, Err(AppError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate().times(1).returning(|_| {
            Err(AppError::BackendError {
                backend: Backend::Generation,
                status: Some(500),
                message: "upstream failure".to_string(),
            })
        });

        let pipeline = pipeline(embedder(1), store(1, vec![chunk("a", 0.9)]), llm);
        let result = pipeline.answer("question", "req-7").await;
        assert!(matches!(result, Err(AppError::BackendError { .. })));
    }

    #[tokio::test]
    async fn test_search_failure_skips_generation() {
        let mut store = MockVectorStore::new();
        store.expect_search().times(1).returning(|_, _, _| {
            Err(AppError::BackendUnavailable {
                backend: Backend::VectorSearch,
                message: "connection refused".to_string(),
            })
        });
        let mut llm = MockLLMClient::new();
        llm.expect_generate().times(0);

        let pipeline = pipeline(embedder(1), store, llm);
        let result = pipeline.answer("question", "req-8").await;
        assert!(matches!(result, Err(AppError::BackendUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_verify_dimensions() {
        let mut store = MockVectorStore::new();
        store.expect_dimensions().times(1).returning(|| Ok(3));

        let pipeline = pipeline(embedder(1), store, MockLLMClient::new());
        assert_eq!(pipeline.verify_dimensions().await.unwrap(), 3);

        let mut store = MockVectorStore::new();
        store.expect_dimensions().returning(|| Ok(3));
        let mut wide = MockEmbeddingClient::new();
        wide.expect_embed()
            .returning(|_| Ok(EmbeddingVector::from(vec![0.0; 1024])));
        let mismatched = RagPipeline::new(
            Arc::new(wide),
            Arc::new(store),
            Arc::new(MockLLMClient::new()),
            PipelineSettings::default(),
        );
        assert!(matches!(
            mismatched.verify_dimensions().await,
            Err(AppError::DimensionMismatch {
                expected: 3,
                actual: 1024
            })
        ));
    }
}
