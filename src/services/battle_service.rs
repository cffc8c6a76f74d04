//! Battle lifecycle commands: create, start, close the open round, advance,
//! and the read-only projections. Every mutating command runs inside the
//! battle's single-writer section, so clients always observe fully-committed
//! states.

use std::time::{Duration, SystemTime};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        battle::{
            ActionResponse, BattleListResponse, BattleSnapshot, BattleSummary, CreateBattleRequest,
        },
        common::{GroupSummary, OpenQuestion, RevealedQuestion},
        identity::Identity,
    },
    error::ServiceError,
    services::{round_timer, scoring, sse_events},
    state::{
        BattleEvent, BattleHandle, BattlePhase, RoundPhase, SharedState,
        battle::{BattleSession, Choice, ChoiceColor, Question},
        transitions::run_transition_with_broadcast,
    },
};

/// Create a new battle around a frozen question set.
///
/// The question list is validated up front and never changes afterwards; the
/// battle opens in the pending phase with its join window open.
pub async fn create_battle(
    state: &SharedState,
    identity: &Identity,
    request: CreateBattleRequest,
) -> Result<BattleSummary, ServiceError> {
    identity.require_teacher()?;

    let config = state.config();
    let count = request.questions.len();
    if count < config.min_rounds || count > config.max_rounds {
        return Err(ServiceError::InvalidQuestionCount {
            count,
            min: config.min_rounds,
            max: config.max_rounds,
        });
    }

    if request.round_seconds == Some(0) {
        return Err(ServiceError::InvalidInput(
            "round_seconds must be at least 1".into(),
        ));
    }

    let mut questions = Vec::with_capacity(count);
    for input in request.questions {
        let choices = input.choices.len();
        if choices < 2 || choices > config.choice_slots {
            return Err(ServiceError::InvalidInput(format!(
                "questions must offer between 2 and {} choices (got {choices})",
                config.choice_slots
            )));
        }
        if input.correct_index >= choices {
            return Err(ServiceError::InvalidChoice {
                index: input.correct_index,
                choices,
            });
        }

        questions.push(Question {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            text: input.text,
            choices: input
                .choices
                .into_iter()
                .enumerate()
                .map(|(slot, label)| Choice {
                    label,
                    color: ChoiceColor::for_slot(slot),
                })
                .collect(),
            correct_index: input.correct_index,
        });
    }

    let round_seconds = request.round_seconds.or(config.default_round_seconds);
    let session = BattleSession::new(request.name, identity.user_id, questions, round_seconds);
    let handle = state.register_battle(session);
    info!(battle_id = %handle.id(), owner_id = %identity.user_id, "battle created");

    let phase = handle.phase().await;
    Ok(handle
        .read_session(|session| BattleSummary::from_session(session, &phase))
        .await)
}

/// Start the battle: the join window closes and round 0 opens.
pub async fn start_battle(
    state: &SharedState,
    identity: &Identity,
    battle_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let handle = state.battle(battle_id)?;
    require_owner(&handle, identity).await?;

    let min_viable = state.config().min_viable_groups;
    let started = run_transition_with_broadcast(&handle, BattleEvent::Start, || async {
        handle
            .with_session_mut(|session| {
                let count = session.groups.len();
                if count < min_viable {
                    return Err(ServiceError::InsufficientGroups {
                        count,
                        min: min_viable,
                    });
                }

                let now = SystemTime::now();
                session.started_at = Some(now);
                session.round_opened_at = Some(now);
                OpenQuestion::from_session(session, 0).ok_or(ServiceError::UnknownQuestion(0))
            })
            .await
    })
    .await;

    let question = match started {
        Ok(question) => question,
        Err(err @ ServiceError::InvalidPhase(_)) => {
            return Err(match handle.phase().await {
                BattlePhase::Finished => ServiceError::BattleFinished,
                _ => err,
            });
        }
        Err(err) => return Err(err),
    };

    info!(%battle_id, "battle started");
    sse_events::broadcast_round_opened(&handle, 0, question);
    arm_round_timer(state, &handle, 0).await;

    Ok(ActionResponse {
        message: "battle started; round 0 is open".into(),
    })
}

/// Close the currently open round on the teacher's explicit command.
///
/// First close wins: when the auto-close timer already closed the round, the
/// command is a no-op and succeeds, so a teacher racing the timer never sees
/// a spurious failure.
pub async fn close_round(
    state: &SharedState,
    identity: &Identity,
    battle_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let handle = state.battle(battle_id)?;
    require_owner(&handle, identity).await?;

    match close_current_round(state, &handle).await {
        Ok(index) => Ok(ActionResponse {
            message: format!("round {index} closed"),
        }),
        Err(err @ ServiceError::InvalidPhase(_)) => match handle.phase().await {
            BattlePhase::Active(RoundPhase::Closed { index }) => Ok(ActionResponse {
                message: format!("round {index} was already closed"),
            }),
            BattlePhase::Finished => Err(ServiceError::BattleFinished),
            _ => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Advance past a closed round: open the next round, or finish the battle
/// when the closed round was the last one. An open round is closed (and
/// scored) first, so a teacher can advance directly from an open round.
pub async fn advance_battle(
    state: &SharedState,
    identity: &Identity,
    battle_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    let handle = state.battle(battle_id)?;
    require_owner(&handle, identity).await?;

    if let BattlePhase::Active(RoundPhase::Open { .. }) = handle.phase().await {
        if let Err(err) = close_current_round(state, &handle).await {
            let already_closed = matches!(
                handle.phase().await,
                BattlePhase::Active(RoundPhase::Closed { .. })
            );
            // Losing the close race to the timer is fine; the round is
            // closed either way.
            if !(already_closed && matches!(err, ServiceError::InvalidPhase(_))) {
                return Err(err);
            }
        }
    }

    let closed_index = match handle.phase().await {
        BattlePhase::Active(RoundPhase::Closed { index }) => index,
        BattlePhase::Finished => return Err(ServiceError::BattleFinished),
        phase => {
            return Err(ServiceError::InvalidPhase(format!(
                "cannot advance from {phase:?}"
            )));
        }
    };

    let round_count = handle.read_session(|session| session.round_count()).await;
    if closed_index + 1 < round_count {
        let next_index = closed_index + 1;
        let question = run_transition_with_broadcast(&handle, BattleEvent::OpenNext, || async {
            handle
                .with_session_mut(|session| {
                    session.round_opened_at = Some(SystemTime::now());
                    OpenQuestion::from_session(session, next_index)
                        .ok_or(ServiceError::UnknownQuestion(next_index))
                })
                .await
        })
        .await?;

        info!(%battle_id, round_index = next_index, "round opened");
        sse_events::broadcast_round_opened(&handle, next_index, question);
        arm_round_timer(state, &handle, next_index).await;

        Ok(ActionResponse {
            message: format!("round {next_index} is open"),
        })
    } else {
        let standings = run_transition_with_broadcast(&handle, BattleEvent::Finish, || async {
            handle
                .with_session_mut(|session| {
                    session.ended_at = Some(SystemTime::now());
                    Ok(session
                        .standings()
                        .into_iter()
                        .map(GroupSummary::from)
                        .collect::<Vec<_>>())
                })
                .await
        })
        .await?;

        info!(%battle_id, "battle finished");
        sse_events::broadcast_battle_finished(&handle, standings);

        Ok(ActionResponse {
            message: "battle finished; standings are final".into(),
        })
    }
}

/// Timer-driven close of the round at `round_index`. Stands down silently when
/// an explicit close or advance won the race.
pub async fn auto_close_round(state: SharedState, battle_id: Uuid, round_index: usize) {
    let handle = match state.battle(battle_id) {
        Ok(handle) => handle,
        Err(_) => {
            debug!(%battle_id, "timer fired for an unregistered battle");
            return;
        }
    };

    match handle.phase().await {
        BattlePhase::Active(RoundPhase::Open { index }) if index == round_index => {}
        phase => {
            debug!(%battle_id, round_index, ?phase, "timer lost the close race");
            return;
        }
    }

    match close_current_round(&state, &handle).await {
        Ok(index) => info!(%battle_id, round_index = index, "round auto-closed"),
        Err(err) => debug!(%battle_id, round_index, error = %err, "auto-close skipped"),
    }
}

/// Full read-only projection of one battle.
pub async fn battle_snapshot(
    state: &SharedState,
    battle_id: Uuid,
) -> Result<BattleSnapshot, ServiceError> {
    let handle = state.battle(battle_id)?;
    let phase = handle.phase().await;

    Ok(handle
        .read_session(|session| BattleSnapshot::from_session(session, &phase))
        .await)
}

/// Brief summaries of every registered battle, newest first.
pub async fn list_battles(state: &SharedState) -> BattleListResponse {
    let mut entries = Vec::new();
    for handle in state.battle_handles() {
        let phase = handle.phase().await;
        let entry = handle
            .read_session(|session| {
                (
                    session.created_at,
                    BattleSummary::from_session(session, &phase),
                )
            })
            .await;
        entries.push(entry);
    }

    entries.sort_by(|(a, _), (b, _)| b.cmp(a));
    BattleListResponse {
        battles: entries.into_iter().map(|(_, summary)| summary).collect(),
    }
}

/// Close the open round and commit its scores, broadcasting the reveal.
/// Returns the index of the round that was closed.
async fn close_current_round(
    state: &SharedState,
    handle: &std::sync::Arc<BattleHandle>,
) -> Result<usize, ServiceError> {
    let config = state.config().clone();
    let (index, question, outcomes, groups) =
        run_transition_with_broadcast(handle, BattleEvent::CloseRound, || async {
            // The plan validated we are leaving an open round; re-read the
            // index from the phase snapshot taken under the writer gate.
            let open_index = match handle.phase().await {
                BattlePhase::Active(RoundPhase::Open { index }) => index,
                phase => {
                    return Err(ServiceError::InvalidPhase(format!(
                        "no open round to close in {phase:?}"
                    )));
                }
            };

            handle
                .with_session_mut(|session| {
                    let outcomes = scoring::score_round(session, open_index, &config)?;
                    session.round_opened_at = None;

                    let question = session
                        .question(open_index)
                        .map(RevealedQuestion::from)
                        .ok_or(ServiceError::UnknownQuestion(open_index))?;
                    let groups = session
                        .groups
                        .iter()
                        .map(|(id, group)| GroupSummary::from((*id, group)))
                        .collect::<Vec<_>>();

                    Ok((open_index, question, outcomes, groups))
                })
                .await
        })
        .await?;

    sse_events::broadcast_round_closed(handle, index, question, &outcomes, groups);
    handle.cancel_timer().await;

    Ok(index)
}

/// Reject callers that are not the teacher who owns this battle.
async fn require_owner(handle: &BattleHandle, identity: &Identity) -> Result<(), ServiceError> {
    identity.require_teacher()?;
    let owner_id = handle.read_session(|session| session.owner_id).await;
    if owner_id != identity.user_id {
        return Err(ServiceError::Unauthorized(
            "only the teacher who created this battle can drive it".into(),
        ));
    }
    Ok(())
}

/// Arm the auto-close timer for a freshly opened round, when the battle has a
/// round duration configured.
async fn arm_round_timer(state: &SharedState, handle: &BattleHandle, round_index: usize) {
    let round_seconds = handle.read_session(|session| session.round_seconds).await;
    if let Some(seconds) = round_seconds {
        let timer = round_timer::schedule_auto_close(
            state.clone(),
            handle.id(),
            round_index,
            Duration::from_secs(seconds),
        );
        handle.install_timer(timer).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::{
            answer::SubmitAnswerRequest,
            battle::QuestionInput,
            group::{JoinGroupRequest, StudentInput},
            identity::Role,
        },
        services::{answer_service, group_service},
        state::AppState,
    };

    fn teacher() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: Role::Teacher,
        }
    }

    fn question(text: &str) -> QuestionInput {
        QuestionInput {
            id: None,
            text: text.into(),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
        }
    }

    fn create_request(rounds: usize, round_seconds: Option<u64>) -> CreateBattleRequest {
        CreateBattleRequest {
            name: "history showdown".into(),
            round_seconds,
            questions: (0..rounds).map(|n| question(&format!("q{n}"))).collect(),
        }
    }

    fn join_request(name: &str) -> JoinGroupRequest {
        JoinGroupRequest {
            name: name.into(),
            students: vec![
                StudentInput {
                    id: None,
                    name: "alice".into(),
                },
                StudentInput {
                    id: None,
                    name: "bob".into(),
                },
            ],
        }
    }

    fn small_battle_config() -> AppConfig {
        AppConfig {
            min_rounds: 1,
            ..AppConfig::default()
        }
    }

    async fn setup(
        rounds: usize,
        group_names: &[&str],
    ) -> (SharedState, Identity, Uuid, Vec<Uuid>) {
        let state = AppState::new(small_battle_config());
        let owner = teacher();
        let summary = create_battle(&state, &owner, create_request(rounds, None))
            .await
            .unwrap();

        let mut group_ids = Vec::new();
        for name in group_names {
            let joined = group_service::join_battle(&state, summary.id, join_request(name))
                .await
                .unwrap();
            group_ids.push(joined.group.id);
        }

        (state, owner, summary.id, group_ids)
    }

    async fn submit(
        state: &SharedState,
        battle_id: Uuid,
        group_id: Uuid,
        question_index: usize,
        choice_index: usize,
    ) -> Result<(), ServiceError> {
        answer_service::submit_answer(
            state,
            battle_id,
            SubmitAnswerRequest {
                group_id,
                question_index,
                choice_index,
                response_time_ms: 500,
            },
        )
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn full_battle_flow_produces_expected_standings() {
        let (state, owner, battle_id, groups) = setup(2, &["alpha", "bravo"]).await;
        let (alpha, bravo) = (groups[0], groups[1]);

        start_battle(&state, &owner, battle_id).await.unwrap();

        // Round 0: both correct.
        submit(&state, battle_id, alpha, 0, 0).await.unwrap();
        submit(&state, battle_id, bravo, 0, 0).await.unwrap();
        close_round(&state, &owner, battle_id).await.unwrap();
        advance_battle(&state, &owner, battle_id).await.unwrap();

        // Round 1: only alpha correct. Advancing from the open round closes
        // and scores it before finishing.
        submit(&state, battle_id, alpha, 1, 0).await.unwrap();
        submit(&state, battle_id, bravo, 1, 2).await.unwrap();
        advance_battle(&state, &owner, battle_id).await.unwrap();

        let handle = state.battle(battle_id).unwrap();
        assert_eq!(handle.phase().await, BattlePhase::Finished);

        let snapshot = battle_snapshot(&state, battle_id).await.unwrap();
        let scores: Vec<(Uuid, u32)> = snapshot
            .groups
            .iter()
            .map(|group| (group.id, group.score))
            .collect();
        assert!(scores.contains(&(alpha, 200)));
        assert!(scores.contains(&(bravo, 100)));

        let order: Vec<Uuid> = handle
            .read_session(|session| session.standings().iter().map(|(id, _)| *id).collect())
            .await;
        assert_eq!(order, vec![alpha, bravo]);
    }

    #[tokio::test]
    async fn joining_after_start_is_rejected() {
        let (state, owner, battle_id, _) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();

        let err = group_service::join_battle(&state, battle_id, join_request("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));
    }

    #[tokio::test]
    async fn duplicate_answers_are_rejected() {
        let (state, owner, battle_id, groups) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();

        submit(&state, battle_id, groups[0], 0, 0).await.unwrap();
        let err = submit(&state, battle_id, groups[0], 0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateAnswer { .. }));
    }

    #[tokio::test]
    async fn group_capacity_is_enforced() {
        let state = AppState::new(small_battle_config());
        let owner = teacher();
        let summary = create_battle(&state, &owner, create_request(1, None))
            .await
            .unwrap();

        for n in 0..state.config().max_groups {
            group_service::join_battle(&state, summary.id, join_request(&format!("g{n}")))
                .await
                .unwrap();
        }

        let err = group_service::join_battle(&state, summary.id, join_request("overflow"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded { max: 10 }));
    }

    #[tokio::test]
    async fn closing_twice_is_a_no_op_and_scores_stay_committed() {
        let (state, owner, battle_id, groups) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();
        submit(&state, battle_id, groups[0], 0, 0).await.unwrap();

        close_round(&state, &owner, battle_id).await.unwrap();
        let handle = state.battle(battle_id).unwrap();
        let score_after_first = handle
            .read_session(|session| session.groups[&groups[0]].score)
            .await;

        close_round(&state, &owner, battle_id).await.unwrap();
        let score_after_second = handle
            .read_session(|session| session.groups[&groups[0]].score)
            .await;
        assert_eq!(score_after_first, score_after_second);
        assert_eq!(score_after_first, state.config().points_per_correct);
    }

    #[tokio::test]
    async fn submissions_after_close_are_rejected() {
        let (state, owner, battle_id, groups) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();
        close_round(&state, &owner, battle_id).await.unwrap();

        let err = submit(&state, battle_id, groups[0], 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RoundClosed { .. }));
    }

    #[tokio::test]
    async fn starting_needs_enough_groups() {
        let (state, owner, battle_id, _) = setup(1, &["alpha"]).await;
        let err = start_battle(&state, &owner, battle_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InsufficientGroups { count: 1, min: 2 }
        ));

        // The battle stays pending, so a group can still join and fix it.
        group_service::join_battle(&state, battle_id, join_request("bravo"))
            .await
            .unwrap();
        start_battle(&state, &owner, battle_id).await.unwrap();
    }

    #[tokio::test]
    async fn only_the_owning_teacher_can_drive_the_battle() {
        let (state, _, battle_id, _) = setup(1, &["alpha", "bravo"]).await;

        let other_teacher = teacher();
        let err = start_battle(&state, &other_teacher, battle_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let student = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Student,
        };
        let err = start_battle(&state, &student, battle_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn advancing_a_pending_battle_is_rejected() {
        let (state, owner, battle_id, _) = setup(1, &["alpha", "bravo"]).await;
        let err = advance_battle(&state, &owner, battle_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPhase(_)));
    }

    #[tokio::test]
    async fn finished_battles_reject_every_mutation() {
        let (state, owner, battle_id, groups) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();
        advance_battle(&state, &owner, battle_id).await.unwrap();

        let handle = state.battle(battle_id).unwrap();
        assert_eq!(handle.phase().await, BattlePhase::Finished);

        assert!(matches!(
            submit(&state, battle_id, groups[0], 0, 0).await,
            Err(ServiceError::BattleFinished)
        ));
        assert!(matches!(
            advance_battle(&state, &owner, battle_id).await,
            Err(ServiceError::BattleFinished)
        ));
        assert!(matches!(
            close_round(&state, &owner, battle_id).await,
            Err(ServiceError::BattleFinished)
        ));
        assert!(matches!(
            start_battle(&state, &owner, battle_id).await,
            Err(ServiceError::BattleFinished)
        ));
        assert!(matches!(
            group_service::join_battle(&state, battle_id, join_request("late")).await,
            Err(ServiceError::BattleFinished)
        ));
    }

    #[tokio::test]
    async fn concurrent_submissions_record_exactly_one_attempt() {
        let (state, owner, battle_id, groups) = setup(1, &["alpha", "bravo"]).await;
        start_battle(&state, &owner, battle_id).await.unwrap();
        let group = groups[0];

        let mut tasks = Vec::new();
        for n in 0..8 {
            let state = state.clone();
            tasks.push(tokio::spawn(async move {
                submit(&state, battle_id, group, 0, n % 4).await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(ServiceError::DuplicateAnswer { .. }) => {}
                Err(err) => panic!("unexpected submission error: {err}"),
            }
        }
        assert_eq!(accepted, 1);

        let handle = state.battle(battle_id).unwrap();
        let recorded = handle
            .read_session(|session| {
                session
                    .round_attempts(0)
                    .filter(|attempt| attempt.group_id == group)
                    .count()
            })
            .await;
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn question_set_bounds_are_enforced() {
        let state = AppState::new(AppConfig::default());
        let owner = teacher();

        let err = create_battle(&state, &owner, create_request(2, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidQuestionCount {
                count: 2,
                min: 5,
                max: 20
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn open_rounds_auto_close_when_the_timer_fires() {
        let state = AppState::new(small_battle_config());
        let owner = teacher();
        let summary = create_battle(&state, &owner, create_request(1, Some(30)))
            .await
            .unwrap();
        for name in ["alpha", "bravo"] {
            group_service::join_battle(&state, summary.id, join_request(name))
                .await
                .unwrap();
        }

        start_battle(&state, &owner, summary.id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;

        // Yield until the fired timer task has finished closing the round.
        let handle = state.battle(summary.id).unwrap();
        let closed = BattlePhase::Active(RoundPhase::Closed { index: 0 });
        for _ in 0..100 {
            if handle.phase().await == closed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.phase().await, closed);
    }

    #[tokio::test]
    async fn explicit_close_cancels_the_timer() {
        let state = AppState::new(small_battle_config());
        let owner = teacher();
        let summary = create_battle(&state, &owner, create_request(2, Some(30)))
            .await
            .unwrap();
        for name in ["alpha", "bravo"] {
            group_service::join_battle(&state, summary.id, join_request(name))
                .await
                .unwrap();
        }

        start_battle(&state, &owner, summary.id).await.unwrap();
        close_round(&state, &owner, summary.id).await.unwrap();
        advance_battle(&state, &owner, summary.id).await.unwrap();

        // Round 1 is open; the round 0 timer is gone and only round 1's is armed.
        let handle = state.battle(summary.id).unwrap();
        assert_eq!(
            handle.phase().await,
            BattlePhase::Active(RoundPhase::Open { index: 1 })
        );
    }
}
