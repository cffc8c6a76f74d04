use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::group::{JoinGroupRequest, JoinGroupResponse, ResolveJoinCodeResponse},
    error::AppError,
    services::group_service,
    state::SharedState,
};

/// Routes handling group registration and join-code resolution.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/battles/{id}/groups", post(join_battle))
        .route("/groups/{code}", get(resolve_join_code))
}

/// Register a new group on a pending battle.
#[utoipa::path(
    post,
    path = "/battles/{id}/groups",
    tag = "group",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    request_body = JoinGroupRequest,
    responses(
        (status = 200, description = "Group admitted", body = JoinGroupResponse),
        (status = 400, description = "Roster outside the configured bounds"),
        (status = 409, description = "Battle already started or full")
    )
)]
pub async fn join_battle(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinGroupRequest>,
) -> Result<Json<JoinGroupResponse>, AppError> {
    payload.validate()?;
    let response = group_service::join_battle(&state, id, payload).await?;
    Ok(Json(response))
}

/// Resolve a join code back to its battle and group.
#[utoipa::path(
    get,
    path = "/groups/{code}",
    tag = "group",
    params(("code" = String, Path, description = "Join code handed out at registration")),
    responses(
        (status = 200, description = "Code resolved", body = ResolveJoinCodeResponse),
        (status = 404, description = "Unknown join code")
    )
)]
pub async fn resolve_join_code(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<ResolveJoinCodeResponse>, AppError> {
    let response = group_service::resolve_join_code(&state, &code).await?;
    Ok(Json(response))
}
