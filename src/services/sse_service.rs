use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dto::sse::{BattleStatusEvent, ServerEvent},
    error::ServiceError,
    services::sse_events::BATTLE_STATUS_EVENT,
    state::{BattlePhase, RoundPhase, SharedState},
};

/// Open an SSE stream for one battle's event feed.
///
/// The stream starts with a status event describing the current phase, so a
/// late subscriber knows where the battle stands without polling the snapshot
/// route first. Everything after that arrives in broadcast order.
pub async fn battle_stream(
    state: &SharedState,
    battle_id: Uuid,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let handle = state.battle(battle_id)?;
    let receiver = handle.events().subscribe();

    let phase = handle.phase().await;
    let round_index = match phase {
        BattlePhase::Active(RoundPhase::Open { index })
        | BattlePhase::Active(RoundPhase::Closed { index }) => Some(index),
        _ => None,
    };
    let initial = ServerEvent::json(
        BATTLE_STATUS_EVENT.to_string(),
        &BattleStatusEvent {
            phase: (&phase).into(),
            round_index,
        },
    )
    .unwrap_or_else(|_| ServerEvent::new(BATTLE_STATUS_EVENT.to_string(), "{}".to_string()));

    Ok(to_sse_stream(receiver, initial, battle_id))
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// logging once the client disconnects.
fn to_sse_stream(
    mut receiver: tokio::sync::broadcast::Receiver<ServerEvent>,
    initial: ServerEvent,
    battle_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        if tx.send(Ok(to_event(initial))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive.
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(%battle_id, "battle SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
