use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::answer::{SubmitAnswerRequest, SubmitAnswerResponse},
    error::AppError,
    services::answer_service,
    state::SharedState,
};

/// Routes accepting answer submissions.
pub fn router() -> Router<SharedState> {
    Router::new().route("/battles/{id}/answers", post(submit_answer))
}

/// Submit a group's answer to the currently open question.
#[utoipa::path(
    post,
    path = "/battles/{id}/answers",
    tag = "answer",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer accepted", body = SubmitAnswerResponse),
        (status = 409, description = "Round closed or duplicate answer"),
        (status = 404, description = "Unknown battle, group, or question")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let response = answer_service::submit_answer(&state, id, payload).await?;
    Ok(Json(response))
}
