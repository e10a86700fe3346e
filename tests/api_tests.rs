mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::*;
use docqa::api::create_router;
use docqa::db::{AuditLog, TursoAuditLog};
use docqa::rag::{PipelineSettings, RagPipeline};
use docqa::types::{AppError, Backend};
use docqa::AppState;
use serde_json::{json, Value};
use std::sync::Arc;

// ============= Helpers =============

fn reset_docs() -> MockVectorStore {
    MockVectorStore::with_chunks(vec![
        chunk("doc-reset-1", 0.81, "Hold the power button for ten seconds."),
        chunk("doc-reset-2", 0.62, "The device restarts with factory settings."),
    ])
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        score_threshold: 0.5,
        ..fast_settings()
    }
}

fn server_with(store: MockVectorStore, llm: MockLLMClient, audit: Arc<dyn AuditLog>) -> TestServer {
    let pipeline = RagPipeline::new(
        Arc::new(MockEmbedder::new()),
        Arc::new(store),
        Arc::new(llm),
        settings(),
    )
    .with_audit_log(audit.clone());

    let state = AppState {
        pipeline: Arc::new(pipeline),
        audit,
    };
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

fn create_test_server() -> TestServer {
    server_with(
        reset_docs(),
        MockLLMClient::new("Hold the power button for ten seconds."),
        Arc::new(RecordingAuditLog::default()),
    )
}

// ============= Health & Docs =============

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_document() {
    let server = create_test_server();

    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/v1/answer"]["post"].is_object());
    assert!(body["paths"]["/v1/feedback"]["post"].is_object());
}

// ============= Answer =============

#[tokio::test]
async fn test_answer_with_request_id() {
    let server = create_test_server();

    let response = server
        .post("/v1/answer")
        .json(&json!({
            "question": "What is the reset procedure?",
            "request_id": "req-42"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["request_id"], "req-42");
    assert_eq!(body["answer"], "Hold the power button for ten seconds.");
    assert_eq!(body["metadata"]["chunk_count"], 2);
    assert_eq!(body["metadata"]["fallback"], false);
    assert_eq!(
        body["metadata"]["sources"],
        json!(["doc-reset-1.md", "doc-reset-2.md"])
    );
}

#[tokio::test]
async fn test_answer_generates_request_id() {
    let server = create_test_server();

    let response = server
        .post("/v1/answer")
        .json(&json!({ "question": "What is the reset procedure?" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let request_id = body["request_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn test_answer_fallback() {
    let server = server_with(
        MockVectorStore::empty(),
        MockLLMClient::new("unused"),
        Arc::new(RecordingAuditLog::default()),
    );

    let response = server
        .post("/v1/answer")
        .json(&json!({ "question": "How do I bake bread?" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["metadata"]["fallback"], true);
    assert_eq!(body["metadata"]["chunk_count"], 0);
    assert!(body["metadata"]["top_score"].is_null());
}

#[tokio::test]
async fn test_answer_empty_question() {
    let server = create_test_server();

    let response = server
        .post("/v1/answer")
        .json(&json!({ "question": "  " }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["kind"], "input");
}

#[tokio::test]
async fn test_answer_malformed_body() {
    let server = create_test_server();

    let response = server
        .post("/v1/answer")
        .json(&json!({ "text": "wrong field" }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_answer_error_status_mapping() {
    let cases = [
        (
            AppError::RateLimited { retry_after: None },
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
        ),
        (
            AppError::BackendUnavailable {
                backend: Backend::Generation,
                message: "timed out".to_string(),
            },
            StatusCode::SERVICE_UNAVAILABLE,
            "backend_unavailable",
        ),
        (generation_error(), StatusCode::BAD_GATEWAY, "backend_error"),
        (AppError::EmptyResponse, StatusCode::BAD_GATEWAY, "empty_response"),
    ];

    for (error, status, kind) in cases {
        let server = server_with(
            reset_docs(),
            MockLLMClient::failing(error),
            Arc::new(RecordingAuditLog::default()),
        );

        let response = server
            .post("/v1/answer")
            .json(&json!({ "question": "What is the reset procedure?" }))
            .await;

        response.assert_status(status);
        let body: Value = response.json();
        assert_eq!(body["kind"], kind);
        assert!(body["error"].as_str().is_some());
    }
}

// ============= Feedback =============

#[tokio::test]
async fn test_feedback_round_trip_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let audit = Arc::new(
        TursoAuditLog::new_local(path.to_str().unwrap())
            .await
            .unwrap(),
    );
    let server = server_with(reset_docs(), MockLLMClient::new("answer"), audit.clone());

    server
        .post("/v1/answer")
        .json(&json!({ "question": "What is the reset procedure?", "request_id": "req-fb" }))
        .await
        .assert_status_ok();

    // the audit write is detached from the request
    let mut stored = None;
    for _ in 0..100 {
        stored = audit.get("req-fb").await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(stored.is_some(), "audit record was never written");

    let first = server
        .post("/v1/feedback")
        .json(&json!({ "request_id": "req-fb", "helpful": true }))
        .await;
    first.assert_status_ok();
    assert_eq!(first.json::<Value>()["updated"], true);

    let second = server
        .post("/v1/feedback")
        .json(&json!({ "request_id": "req-fb", "helpful": false }))
        .await;
    second.assert_status_ok();
    assert_eq!(second.json::<Value>()["updated"], false);

    let record = audit.get("req-fb").await.unwrap().unwrap();
    assert_eq!(record.feedback, Some(true));
}

#[tokio::test]
async fn test_feedback_unknown_request() {
    let server = create_test_server();

    let response = server
        .post("/v1/feedback")
        .json(&json!({ "request_id": "never-seen", "helpful": true }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["updated"], false);
}

#[tokio::test]
async fn test_feedback_requires_request_id() {
    let server = create_test_server();

    let response = server
        .post("/v1/feedback")
        .json(&json!({ "request_id": "", "helpful": true }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let server = create_test_server();
    let question = "a".repeat(docqa::api::routes::MAX_BODY_BYTES + 1);

    let response = server
        .post("/v1/answer")
        .json(&json!({ "question": question }))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}
