//! Answer ledger commands: accepts at most one attempt per (group, question)
//! and only while the targeted round is open.

use uuid::Uuid;

use crate::{
    dto::answer::{SubmitAnswerRequest, SubmitAnswerResponse},
    error::ServiceError,
    state::{BattlePhase, RoundPhase, SharedState},
};

/// Record a group's answer to the currently open question.
///
/// The phase check and the ledger append run under the battle's writer gate,
/// so a submission can never slip past a concurrent round close: it either
/// lands before the close (and gets scored) or fails with `RoundClosed`.
pub async fn submit_answer(
    state: &SharedState,
    battle_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let handle = state.battle(battle_id)?;

    let accepted_at = handle
        .mutate(move |session, phase| {
            let open_index = match phase {
                BattlePhase::Active(RoundPhase::Open { index }) => index,
                BattlePhase::Active(RoundPhase::Closed { .. }) => {
                    return Err(ServiceError::RoundClosed {
                        question_index: request.question_index,
                    });
                }
                BattlePhase::Pending => {
                    return Err(ServiceError::InvalidPhase(
                        "the battle has not started yet".into(),
                    ));
                }
                BattlePhase::Finished => return Err(ServiceError::BattleFinished),
            };

            if request.question_index >= session.round_count() {
                return Err(ServiceError::UnknownQuestion(request.question_index));
            }
            if request.question_index != open_index {
                return Err(ServiceError::RoundClosed {
                    question_index: request.question_index,
                });
            }

            session.record_attempt(
                request.group_id,
                request.question_index,
                request.choice_index,
                request.response_time_ms,
            )
        })
        .await?;

    Ok(SubmitAnswerResponse::accepted(accepted_at))
}
