use crate::{
    AppState,
    types::{AnswerRequest, AnswerResponse, Result},
};
use axum::{Json, extract::State};
use uuid::Uuid;

/// Answer a question from the documentation
#[utoipa::path(
    post,
    path = "/v1/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Grounded or fallback answer", body = AnswerResponse),
        (status = 400, description = "Empty or oversized question"),
        (status = 429, description = "Generation backend still rate limited after retries"),
        (status = 502, description = "A backend returned an error or no text"),
        (status = 503, description = "A backend is unreachable or timed out")
    ),
    tag = "answer"
)]
pub async fn answer(
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    let request_id = payload
        .request_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let answer = state.pipeline.answer(&payload.question, &request_id).await?;

    Ok(Json(AnswerResponse {
        request_id,
        answer: answer.text,
        metadata: answer.metadata,
    }))
}
