use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        battle::{
            ActionResponse, BattleListResponse, BattleSnapshot, BattleSummary, CreateBattleRequest,
        },
        identity::Identity,
    },
    error::AppError,
    services::battle_service,
    state::SharedState,
};

/// Routes driving the battle lifecycle: creation, start, round close, advance,
/// plus the read-only listing and snapshot projections.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/battles", post(create_battle).get(list_battles))
        .route("/battles/{id}", get(battle_snapshot))
        .route("/battles/{id}/start", post(start_battle))
        .route("/battles/{id}/close", post(close_round))
        .route("/battles/{id}/advance", post(advance_battle))
}

/// Create a new battle around a frozen question set.
#[utoipa::path(
    post,
    path = "/battles",
    tag = "battle",
    request_body = CreateBattleRequest,
    responses(
        (status = 200, description = "Battle created", body = BattleSummary),
        (status = 400, description = "Invalid question set"),
        (status = 401, description = "Caller is not a teacher")
    )
)]
pub async fn create_battle(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<CreateBattleRequest>,
) -> Result<Json<BattleSummary>, AppError> {
    payload.validate()?;
    let summary = battle_service::create_battle(&state, &identity, payload).await?;
    Ok(Json(summary))
}

/// List the battles currently registered.
#[utoipa::path(
    get,
    path = "/battles",
    tag = "battle",
    responses((status = 200, description = "Registered battles", body = BattleListResponse))
)]
pub async fn list_battles(
    State(state): State<SharedState>,
) -> Result<Json<BattleListResponse>, AppError> {
    Ok(Json(battle_service::list_battles(&state).await))
}

/// Full read-only projection of one battle.
#[utoipa::path(
    get,
    path = "/battles/{id}",
    tag = "battle",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Battle snapshot", body = BattleSnapshot),
        (status = 404, description = "Unknown battle")
    )
)]
pub async fn battle_snapshot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BattleSnapshot>, AppError> {
    let snapshot = battle_service::battle_snapshot(&state, id).await?;
    Ok(Json(snapshot))
}

/// Close the join window and open round 0.
#[utoipa::path(
    post,
    path = "/battles/{id}/start",
    tag = "battle",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Battle started", body = ActionResponse),
        (status = 409, description = "Wrong phase or too few groups")
    )
)]
pub async fn start_battle(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = battle_service::start_battle(&state, &identity, id).await?;
    Ok(Json(response))
}

/// Close the open round and commit its scores.
#[utoipa::path(
    post,
    path = "/battles/{id}/close",
    tag = "battle",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Round closed (or already closed)", body = ActionResponse),
        (status = 409, description = "No round is running")
    )
)]
pub async fn close_round(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = battle_service::close_round(&state, &identity, id).await?;
    Ok(Json(response))
}

/// Open the next round, or finish the battle after the last one.
#[utoipa::path(
    post,
    path = "/battles/{id}/advance",
    tag = "battle",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Battle advanced", body = ActionResponse),
        (status = 409, description = "Wrong phase to advance from")
    )
)]
pub async fn advance_battle(
    State(state): State<SharedState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = battle_service::advance_battle(&state, &identity, id).await?;
    Ok(Json(response))
}
