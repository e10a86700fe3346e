use crate::types::{AppError, Backend, EmbeddingVector, Result, RetrievedChunk};
use crate::utils::config::VectorStoreConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::vectorstore::{rank_chunks, VectorStore};

/// Qdrant vector store implementation.
///
/// Talks to the Qdrant REST API of a single collection. Requires a running
/// Qdrant instance; the collection is populated by the offline ingestion job.
pub struct QdrantVectorStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    text_field: String,
    source_field: String,
    dimensions: Option<usize>,
    vector_name: Option<String>,
}

/// Vector configuration of a collection: its size and, for collections
/// created with named vectors, the name searches must target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorLayout {
    pub size: usize,
    pub name: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum QueryVector<'a> {
    Unnamed(&'a [f32]),
    Named { name: &'a str, vector: &'a [f32] },
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: QueryVector<'a>,
    limit: usize,
    score_threshold: f32,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantVectorStore {
    pub fn new(url: &str, collection: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create Qdrant client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key: None,
            text_field: "text".to_string(),
            source_field: "source".to_string(),
            dimensions: None,
            vector_name: None,
        })
    }

    pub fn from_config(config: &VectorStoreConfig, api_key: Option<String>) -> Result<Self> {
        let store = Self::new(&config.url, config.collection.clone(), config.timeout())?
            .with_payload_fields(config.text_field.clone(), config.source_field.clone());
        Ok(match api_key {
            Some(key) => store.with_api_key(key),
            None => store,
        })
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_payload_fields(mut self, text_field: String, source_field: String) -> Self {
        self.text_field = text_field;
        self.source_field = source_field;
        self
    }

    /// Pin the expected dimensionality so mismatched query vectors are
    /// rejected locally instead of by the server.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Search a named vector instead of the collection's default one.
    pub fn with_vector_name(mut self, name: impl Into<String>) -> Self {
        self.vector_name = Some(name.into());
        self
    }

    /// Apply a layout discovered with [`QdrantVectorStore::describe`].
    pub fn with_layout(self, layout: VectorLayout) -> Self {
        let store = self.with_dimensions(layout.size);
        match layout.name {
            Some(name) => store.with_vector_name(name),
            None => store,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Parse scored points from a Qdrant response, skipping points without text.
    fn parse_search_results(&self, points: Vec<ScoredPoint>) -> Vec<RetrievedChunk> {
        points
            .into_iter()
            .filter_map(|point| {
                let id = point_id(&point.id)?;
                let payload = point.payload.unwrap_or_default();

                let Some(text) = payload.get(&self.text_field).and_then(Value::as_str) else {
                    warn!(point_id = %id, field = %self.text_field, "Point has no text payload, skipping");
                    return None;
                };

                let source = payload
                    .get(&self.source_field)
                    .or_else(|| payload.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.clone());

                Some(RetrievedChunk {
                    id,
                    text: text.to_string(),
                    source,
                    score: point.score,
                })
            })
            .collect()
    }
}

impl QdrantVectorStore {
    /// Fetch the collection's vector layout.
    pub async fn describe(&self) -> Result<VectorLayout> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| AppError::from_transport(Backend::VectorSearch, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(Backend::VectorSearch, status, &body));
        }

        let info: Value = response
            .json()
            .await
            .map_err(|e| AppError::from_transport(Backend::VectorSearch, e))?;

        let layout = vector_layout(&info).ok_or_else(|| {
            AppError::Configuration(format!(
                "Collection '{}' does not declare a single vector size",
                self.collection
            ))
        })?;

        debug!(
            collection = %self.collection,
            dimensions = layout.size,
            vector = ?layout.name,
            "Collection vector layout"
        );
        Ok(layout)
    }
}

/// Qdrant point ids are unsigned integers or UUID strings.
fn point_id(id: &Value) -> Option<String> {
    match id {
        Value::Number(num) => Some(num.to_string()),
        Value::String(uuid) => Some(uuid.clone()),
        _ => None,
    }
}

/// Read `result.config.params.vectors`, accepting a single named vector too.
fn vector_layout(info: &Value) -> Option<VectorLayout> {
    let vectors = info.pointer("/result/config/params/vectors")?;
    if let Some(size) = vectors.get("size").and_then(Value::as_u64) {
        return Some(VectorLayout {
            size: usize::try_from(size).ok()?,
            name: None,
        });
    }
    let named = vectors.as_object()?;
    if named.len() != 1 {
        return None;
    }
    let (name, params) = named.iter().next()?;
    let size = params.get("size")?.as_u64()?;
    Some(VectorLayout {
        size: usize::try_from(size).ok()?,
        name: Some(name.clone()),
    })
}

// ============================================================================
// VectorStore Trait Implementation
// ============================================================================

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn search(
        &self,
        embedding: &EmbeddingVector,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        if let Some(expected) = self.dimensions {
            if embedding.dimensions() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: embedding.dimensions(),
                });
            }
        }

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let vector = match &self.vector_name {
            Some(name) => QueryVector::Named {
                name,
                vector: embedding.as_slice(),
            },
            None => QueryVector::Unnamed(embedding.as_slice()),
        };
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&SearchRequest {
                vector,
                limit: top_k,
                score_threshold: threshold,
                with_payload: true,
            })
            .send()
            .await
            .map_err(|e| AppError::from_transport(Backend::VectorSearch, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(Backend::VectorSearch, status, &body));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::from_transport(Backend::VectorSearch, e))?;

        let chunks = rank_chunks(self.parse_search_results(body.result), top_k);

        match (chunks.first(), chunks.last()) {
            (Some(best), Some(worst)) => info!(
                collection = %self.collection,
                found = chunks.len(),
                top_k,
                threshold,
                "Found relevant chunks (scores {:.3} - {:.3})",
                worst.score,
                best.score
            ),
            _ => info!(
                collection = %self.collection,
                top_k,
                threshold,
                "No chunks above threshold"
            ),
        }

        Ok(chunks)
    }

    async fn dimensions(&self) -> Result<usize> {
        Ok(self.describe().await?.size)
    }
}
