use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{BattlePhase, RoundPhase};

/// Publicly visible battle phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleBattlePhase {
    /// Join window is open; the battle has not started.
    Pending,
    /// A round is open for answers.
    RoundOpen,
    /// The current round closed; scores for it are committed.
    RoundClosed,
    /// The battle is over and standings are final.
    Finished,
}

impl From<&BattlePhase> for VisibleBattlePhase {
    fn from(value: &BattlePhase) -> Self {
        match value {
            BattlePhase::Pending => VisibleBattlePhase::Pending,
            BattlePhase::Active(RoundPhase::Open { .. }) => VisibleBattlePhase::RoundOpen,
            BattlePhase::Active(RoundPhase::Closed { .. }) => VisibleBattlePhase::RoundClosed,
            BattlePhase::Finished => VisibleBattlePhase::Finished,
        }
    }
}
