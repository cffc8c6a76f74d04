use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::{GroupSummary, OpenQuestion, RevealedQuestion},
    phase::VisibleBattlePhase,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across a battle's SSE channel.
pub struct ServerEvent {
    /// SSE event name, when one is set.
    pub event: Option<String>,
    /// Serialized event data.
    pub data: String,
}

impl ServerEvent {
    /// Build an event with a pre-serialized data payload.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the battle's phase changes.
pub struct BattleStatusEvent {
    /// New phase.
    pub phase: VisibleBattlePhase,
    /// Current round index while active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_index: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a group's public projection changes (join, score commit).
pub struct GroupUpdateEvent {
    /// Updated group projection.
    pub group: GroupSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round opens; carries the question with choices only.
pub struct RoundOpenedEvent {
    /// Index of the round that opened.
    pub round_index: usize,
    /// The open question projection (no correct index).
    pub question: OpenQuestion,
}

#[derive(Debug, Serialize, ToSchema)]
/// One group's outcome for a closed round.
pub struct RoundResultSummary {
    /// Group the result belongs to.
    pub group_id: Uuid,
    /// The choice the group submitted, absent when it never answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_index: Option<usize>,
    /// Whether the submitted choice was correct.
    pub correct: bool,
    /// Points awarded for this round.
    pub awarded: u32,
    /// Recorded response latency, when the group answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round closes: reveals the correct index and the per-group
/// results of the committed scoring pass.
pub struct RoundClosedEvent {
    /// Index of the round that closed.
    pub round_index: usize,
    /// The question including its correct index.
    pub question: RevealedQuestion,
    /// Per-group results in join order.
    pub results: Vec<RoundResultSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once when the battle reaches its terminal phase.
pub struct BattleFinishedEvent {
    /// Final standings, best score first.
    pub standings: Vec<GroupSummary>,
}
