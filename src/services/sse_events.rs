//! Event construction and fan-out onto a battle's broadcast hub. Serialization
//! failures are logged and dropped; event delivery never fails a command.

use tracing::warn;

use crate::{
    dto::{
        common::{GroupSummary, OpenQuestion, RevealedQuestion},
        sse::{
            BattleFinishedEvent, BattleStatusEvent, GroupUpdateEvent, RoundClosedEvent,
            RoundOpenedEvent, RoundResultSummary, ServerEvent,
        },
    },
    services::scoring::RoundOutcome,
    state::{BattleHandle, BattlePhase, RoundPhase},
};

/// Event name for phase changes.
pub const BATTLE_STATUS_EVENT: &str = "battle.status";
/// Event name for public group projections (join, score commit).
pub const GROUP_UPDATE_EVENT: &str = "group.update";
/// Event name announcing a newly opened round.
pub const ROUND_OPENED_EVENT: &str = "round.opened";
/// Event name revealing a closed round's answer and results.
pub const ROUND_CLOSED_EVENT: &str = "round.closed";
/// Event name carrying the final standings.
pub const BATTLE_FINISHED_EVENT: &str = "battle.finished";

fn emit<T: serde::Serialize>(handle: &BattleHandle, event_name: &str, payload: &T) {
    match ServerEvent::json(event_name.to_string(), payload) {
        Ok(event) => handle.events().broadcast(event),
        Err(err) => warn!(
            battle_id = %handle.id(),
            event = event_name,
            error = %err,
            "failed to serialize event; dropping"
        ),
    }
}

/// Announce the battle's new phase after a committed transition.
pub fn broadcast_battle_status(handle: &BattleHandle, phase: BattlePhase) {
    let round_index = match phase {
        BattlePhase::Active(RoundPhase::Open { index })
        | BattlePhase::Active(RoundPhase::Closed { index }) => Some(index),
        _ => None,
    };
    let payload = BattleStatusEvent {
        phase: (&phase).into(),
        round_index,
    };
    emit(handle, BATTLE_STATUS_EVENT, &payload);
}

/// Push one group's refreshed public projection.
pub fn broadcast_group_update(handle: &BattleHandle, group: GroupSummary) {
    emit(handle, GROUP_UPDATE_EVENT, &GroupUpdateEvent { group });
}

/// Announce a newly opened round together with its question (choices only).
pub fn broadcast_round_opened(handle: &BattleHandle, round_index: usize, question: OpenQuestion) {
    emit(
        handle,
        ROUND_OPENED_EVENT,
        &RoundOpenedEvent {
            round_index,
            question,
        },
    );
}

/// Reveal a closed round: the correct choice plus the committed per-group
/// results, followed by one group update per group so scoreboards refresh.
pub fn broadcast_round_closed(
    handle: &BattleHandle,
    round_index: usize,
    question: RevealedQuestion,
    outcomes: &[RoundOutcome],
    groups: Vec<GroupSummary>,
) {
    let results = outcomes
        .iter()
        .map(|outcome| RoundResultSummary {
            group_id: outcome.group_id,
            choice_index: outcome.choice_index,
            correct: outcome.correct,
            awarded: outcome.awarded,
            response_time_ms: outcome.response_time_ms,
        })
        .collect();

    emit(
        handle,
        ROUND_CLOSED_EVENT,
        &RoundClosedEvent {
            round_index,
            question,
            results,
        },
    );

    for group in groups {
        broadcast_group_update(handle, group);
    }
}

/// Announce the terminal phase with the final standings, best score first.
pub fn broadcast_battle_finished(handle: &BattleHandle, standings: Vec<GroupSummary>) {
    emit(
        handle,
        BATTLE_FINISHED_EVENT,
        &BattleFinishedEvent { standings },
    );
}
