//! HTTP API Handlers and Routes
//!
//! Thin axum layer over [`RagPipeline`](crate::rag::RagPipeline). Handlers
//! forward the question and render the result; they hold no pipeline logic.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Router and middleware stack
//!
//! # API Endpoints
//!
//! - `POST /v1/answer` - Answer a question (`{question, request_id?}`)
//! - `POST /v1/feedback` - Mark an earlier answer as helpful or not
//! - `GET /health` - Health check
//! - `GET /api-docs/openapi.json` - OpenAPI description
//!
//! # Errors
//!
//! Failures are returned as `{"error": "...", "kind": "..."}` with a status
//! derived from the error kind: 400 for bad input, 429 when generation stays
//! rate limited, 502/503 for backend failures and 500 otherwise.

use crate::types::{
    AnswerMetadata, AnswerRequest, AnswerResponse, FeedbackRequest, FeedbackResponse,
    HealthResponse,
};
use utoipa::OpenApi;

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

pub use routes::create_router;

#[derive(OpenApi)]
#[openapi(
    info(title = "docqa", description = "Documentation question answering"),
    paths(
        handlers::answer::answer,
        handlers::feedback::feedback,
        handlers::health::health
    ),
    components(schemas(
        AnswerRequest,
        AnswerResponse,
        AnswerMetadata,
        FeedbackRequest,
        FeedbackResponse,
        HealthResponse
    )),
    tags(
        (name = "answer", description = "Question answering"),
        (name = "feedback", description = "Answer feedback"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
