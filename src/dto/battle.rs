use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        common::{GroupSummary, OpenQuestion},
        format_system_time,
        phase::VisibleBattlePhase,
    },
    state::{BattlePhase, RoundPhase, battle::BattleSession},
};

/// Payload used to create a new battle around a frozen question set.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBattleRequest {
    /// Display name of the battle.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Optional maximum round duration in seconds; rounds auto-close when set.
    #[serde(default)]
    pub round_seconds: Option<u64>,
    /// Ordered question list supplied fully formed by the question bank.
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// One question of the battle's set, as supplied by the question bank.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    /// Question-bank identifier; generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Question text.
    #[validate(length(min = 1))]
    pub text: String,
    /// Ordered answer-choice labels.
    pub choices: Vec<String>,
    /// Index of the correct choice within `choices`.
    pub correct_index: usize,
}

/// Summary returned once a battle has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct BattleSummary {
    /// Battle identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current phase.
    pub phase: VisibleBattlePhase,
    /// Number of rounds the battle plays.
    pub round_count: usize,
    /// Number of groups registered so far.
    pub group_count: usize,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl BattleSummary {
    /// Build the brief listing projection from session data and phase.
    pub fn from_session(session: &BattleSession, phase: &BattlePhase) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            phase: phase.into(),
            round_count: session.round_count(),
            group_count: session.groups.len(),
            created_at: format_system_time(session.created_at),
        }
    }
}

/// Response payload listing the battles currently registered.
#[derive(Debug, Serialize, ToSchema)]
pub struct BattleListResponse {
    /// Brief summaries, one per battle.
    pub battles: Vec<BattleSummary>,
}

/// Read-only projection of one battle, pushed after every mutating command
/// and served by the snapshot route. Always reflects the last fully-committed
/// state; mid-transition states are never visible here.
#[derive(Debug, Serialize, ToSchema)]
pub struct BattleSnapshot {
    /// Battle identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current phase.
    pub phase: VisibleBattlePhase,
    /// Index of the current round while the battle is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_index: Option<usize>,
    /// Number of rounds the battle plays.
    pub round_count: usize,
    /// The open question (choices only), present while a round is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<OpenQuestion>,
    /// Per-group scores in join order.
    pub groups: Vec<GroupSummary>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 start timestamp, once the battle left the join window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// RFC3339 end timestamp, once the battle finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl BattleSnapshot {
    /// Build the full projection of a battle from its session data and the
    /// committed phase.
    pub fn from_session(session: &BattleSession, phase: &BattlePhase) -> Self {
        let round_index = match phase {
            BattlePhase::Active(RoundPhase::Open { index })
            | BattlePhase::Active(RoundPhase::Closed { index }) => Some(*index),
            _ => None,
        };
        let question = match phase {
            BattlePhase::Active(RoundPhase::Open { index }) => {
                OpenQuestion::from_session(session, *index)
            }
            _ => None,
        };

        Self {
            id: session.id,
            name: session.name.clone(),
            phase: phase.into(),
            round_index,
            round_count: session.round_count(),
            question,
            groups: session
                .groups
                .iter()
                .map(|(id, group)| GroupSummary::from((*id, group)))
                .collect(),
            created_at: format_system_time(session.created_at),
            started_at: session.started_at.map(format_system_time),
            ended_at: session.ended_at.map(format_system_time),
        }
    }
}

/// Response for start/close/advance lifecycle commands.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable confirmation of the applied command.
    pub message: String,
}
