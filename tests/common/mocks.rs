//! Mock backends for testing.
//!
//! Hand-written implementations of the pipeline's backend traits that count
//! their calls and record what they were asked, so tests can assert on
//! "exactly N generation calls" or "no backend touched".

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::db::{AuditLog, VectorStore};
use docqa::llm::LLMClient;
use docqa::rag::{EmbeddingClient, PipelineSettings, RagPipeline};
use docqa::types::{
    AppError, AuditEvent, Backend, EmbeddingVector, Prompt, Result, RetrievedChunk,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DIMENSIONS: usize = 4;

pub fn chunk(id: &str, score: f32, text: &str) -> RetrievedChunk {
    RetrievedChunk {
        id: id.to_string(),
        text: text.to_string(),
        source: format!("{}.md", id),
        score,
    }
}

// ============= Embedding =============

/// Embedder returning a fixed vector, or a fixed error.
pub struct MockEmbedder {
    calls: AtomicUsize,
    error: Option<AppError>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            error: None,
        }
    }

    pub fn failing(error: AppError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            error: Some(error),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<EmbeddingVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(EmbeddingVector::from(vec![0.25; DIMENSIONS])),
        }
    }
}

// ============= Vector Store =============

/// In-memory index that applies threshold and top-K the way the real
/// backend does.
pub struct MockVectorStore {
    chunks: Vec<RetrievedChunk>,
    calls: AtomicUsize,
    last_params: Mutex<Option<(usize, f32)>>,
    error: Option<AppError>,
}

impl MockVectorStore {
    pub fn with_chunks(chunks: Vec<RetrievedChunk>) -> Self {
        Self {
            chunks,
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::with_chunks(Vec::new())
    }

    pub fn failing(error: AppError) -> Self {
        Self {
            error: Some(error),
            ..Self::empty()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(top_k, threshold)` of the most recent search.
    pub fn last_params(&self) -> Option<(usize, f32)> {
        *self.last_params.lock().unwrap()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn search(
        &self,
        embedding: &EmbeddingVector,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some((top_k, threshold));

        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if embedding.dimensions() != DIMENSIONS {
            return Err(AppError::DimensionMismatch {
                expected: DIMENSIONS,
                actual: embedding.dimensions(),
            });
        }

        let mut hits: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.score >= threshold)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn dimensions(&self) -> Result<usize> {
        Ok(DIMENSIONS)
    }
}

// ============= Generation =============

/// LLM that plays back scripted results, then repeats a default.
pub struct MockLLMClient {
    script: Mutex<VecDeque<Result<String>>>,
    default: Result<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self::scripted(Vec::new(), Ok(response.to_string()))
    }

    pub fn failing(error: AppError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    pub fn scripted(script: Vec<Result<String>>, default: Result<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }
}

pub fn rate_limited() -> AppError {
    AppError::RateLimited { retry_after: None }
}

pub fn generation_error() -> AppError {
    AppError::BackendError {
        backend: Backend::Generation,
        status: Some(500),
        message: "upstream exploded".to_string(),
    }
}

// ============= Audit Log =============

/// Keeps every event in memory and supports feedback like the real store.
#[derive(Default)]
pub struct RecordingAuditLog {
    events: Mutex<Vec<AuditEvent>>,
    feedback: Mutex<Vec<(String, bool)>>,
}

impl RecordingAuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Audit writes run on a detached task; poll until `count` have landed.
    pub async fn wait_for(&self, count: usize) -> Vec<AuditEvent> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn record_feedback(&self, request_id: &str, helpful: bool) -> Result<bool> {
        let known = self
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|event| event.request_id == request_id);
        let mut feedback = self.feedback.lock().unwrap();
        if !known || feedback.iter().any(|(id, _)| id == request_id) {
            return Ok(false);
        }
        feedback.push((request_id.to_string(), helpful));
        Ok(true)
    }
}

/// Audit log whose writes always fail.
pub struct FailingAuditLog {
    pub attempts: AtomicUsize,
}

impl FailingAuditLog {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn record(&self, _event: &AuditEvent) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database("disk full".to_string()))
    }
}

/// Audit log that never finishes a write.
pub struct HangingAuditLog;

#[async_trait]
impl AuditLog for HangingAuditLog {
    async fn record(&self, _event: &AuditEvent) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ============= Pipeline Harness =============

/// A pipeline over mocks, with handles to every mock for assertions.
pub struct Harness {
    pub embedder: Arc<MockEmbedder>,
    pub store: Arc<MockVectorStore>,
    pub llm: Arc<MockLLMClient>,
    pub audit: Arc<RecordingAuditLog>,
    pub pipeline: Arc<RagPipeline>,
}

impl Harness {
    pub fn new(store: MockVectorStore, llm: MockLLMClient, settings: PipelineSettings) -> Self {
        Self::with_embedder(MockEmbedder::new(), store, llm, settings)
    }

    pub fn with_embedder(
        embedder: MockEmbedder,
        store: MockVectorStore,
        llm: MockLLMClient,
        settings: PipelineSettings,
    ) -> Self {
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let llm = Arc::new(llm);
        let audit = Arc::new(RecordingAuditLog::default());

        let pipeline = RagPipeline::new(
            embedder.clone(),
            store.clone(),
            llm.clone(),
            settings,
        )
        .with_audit_log(audit.clone())
        .with_model_name("mock-model");

        Self {
            embedder,
            store,
            llm,
            audit,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn backend_calls(&self) -> (usize, usize, usize) {
        (self.embedder.calls(), self.store.calls(), self.llm.calls())
    }
}

/// Settings with fast backoff so retry tests run quickly in real time.
pub fn fast_settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.retry.base_delay = Duration::from_millis(5);
    settings.retry.max_delay = Duration::from_millis(20);
    settings
}
