use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/battles/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Battle SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown battle")
    )
)]
/// Stream one battle's realtime events to a connected client.
pub async fn battle_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let stream = sse_service::battle_stream(&state, id).await?;
    info!(battle_id = %id, "new battle SSE connection");
    Ok(stream)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/battles/{id}/events", get(battle_stream))
}
