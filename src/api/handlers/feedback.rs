use crate::{
    AppState,
    types::{AppError, FeedbackRequest, FeedbackResponse, Result},
};
use axum::{Json, extract::State};
use tracing::info;

/// Record whether an earlier answer was helpful
///
/// Feedback is kept only for the first submission per request id.
#[utoipa::path(
    post,
    path = "/v1/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Whether the feedback was stored", body = FeedbackResponse),
        (status = 400, description = "Missing request id"),
        (status = 500, description = "Audit database failure")
    ),
    tag = "feedback"
)]
pub async fn feedback(
    State(state): State<AppState>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>> {
    if payload.request_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "request_id must not be empty".to_string(),
        ));
    }

    let updated = state
        .audit
        .record_feedback(&payload.request_id, payload.helpful)
        .await?;

    info!(
        request_id = %payload.request_id,
        helpful = payload.helpful,
        updated,
        "Feedback received"
    );

    Ok(Json(FeedbackResponse { updated }))
}
