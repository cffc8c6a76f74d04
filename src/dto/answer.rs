use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::format_system_time;

/// Payload a group submits to answer the open question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Group submitting the answer.
    pub group_id: Uuid,
    /// Round index the answer targets; must match the open round.
    pub question_index: usize,
    /// Chosen answer-choice index.
    pub choice_index: usize,
    /// Client-measured response latency in milliseconds.
    pub response_time_ms: u64,
}

/// Acknowledgement of an accepted answer attempt. Correctness is never
/// revealed here; it only surfaces in the round-closed event.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// RFC3339 timestamp when the ledger accepted the attempt.
    pub accepted_at: String,
}

impl SubmitAnswerResponse {
    /// Build the acknowledgement from the ledger's acceptance timestamp.
    pub fn accepted(at: SystemTime) -> Self {
        Self {
            accepted_at: format_system_time(at),
        }
    }
}
