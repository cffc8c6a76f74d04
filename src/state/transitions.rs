use std::sync::Arc;

use crate::{
    error::ServiceError,
    services::sse_events::broadcast_battle_status,
    state::{BattleEvent, BattleHandle},
};

/// Execute a planned state-machine transition, then broadcast the resulting
/// phase change on the battle's event stream.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    handle: &Arc<BattleHandle>,
    event: BattleEvent,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, next) = handle.run_transition(event, work).await?;
    broadcast_battle_status(handle, next);
    Ok(res)
}
