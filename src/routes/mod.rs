use axum::Router;

use crate::state::SharedState;

pub mod answer;
pub mod battle;
pub mod docs;
pub mod group;
pub mod health;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(battle::router())
        .merge(group::router())
        .merge(answer::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
