use crate::{dto::health::HealthResponse, state::SharedState};

/// Report process health and the number of registered battles.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.battle_count())
}
