//! Scoring engine: converts a closed round's ledger entries into committed
//! group scores. Runs exactly once per round, in batch, inside the battle's
//! single-writer section so partial results never leak mid-round.

use uuid::Uuid;

use crate::{
    config::{AppConfig, SpeedBonus},
    error::ServiceError,
    state::battle::BattleSession,
};

/// One group's computed outcome for a scored round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Group the outcome belongs to.
    pub group_id: Uuid,
    /// Submitted choice, absent when the group never answered.
    pub choice_index: Option<usize>,
    /// Whether the submitted choice was correct.
    pub correct: bool,
    /// Points awarded and committed to the group's score.
    pub awarded: u32,
    /// Recorded response latency, when the group answered.
    pub response_time_ms: Option<u64>,
}

/// Score the round at `round` and commit the results to the groups.
///
/// One-shot per round index: a second invocation fails with `AlreadyScored`
/// and leaves every score untouched, which makes retried close/advance calls
/// observably idempotent. Group scores only ever increase.
pub fn score_round(
    session: &mut BattleSession,
    round: usize,
    config: &AppConfig,
) -> Result<Vec<RoundOutcome>, ServiceError> {
    let correct_index = session
        .question(round)
        .ok_or(ServiceError::UnknownQuestion(round))?
        .correct_index;

    if session.scored_rounds.contains(&round) {
        return Err(ServiceError::AlreadyScored { round });
    }

    let mut outcomes = Vec::with_capacity(session.groups.len());
    let group_ids: Vec<Uuid> = session.groups.keys().copied().collect();

    for group_id in group_ids {
        let outcome = match session.attempt(group_id, round) {
            Some(attempt) => {
                let correct = attempt.choice_index == correct_index;
                let awarded = if correct {
                    config.points_per_correct
                        + config
                            .speed_bonus
                            .map(|bonus| speed_bonus_points(&bonus, attempt.response_time_ms))
                            .unwrap_or(0)
                } else {
                    0
                };
                RoundOutcome {
                    group_id,
                    choice_index: Some(attempt.choice_index),
                    correct,
                    awarded,
                    response_time_ms: Some(attempt.response_time_ms),
                }
            }
            None => RoundOutcome {
                group_id,
                choice_index: None,
                correct: false,
                awarded: 0,
                response_time_ms: None,
            },
        };

        if let Some(group) = session.groups.get_mut(&group_id) {
            group.score += outcome.awarded;
            if outcome.correct {
                group.correct_count += 1;
            }
        }

        outcomes.push(outcome);
    }

    session.scored_rounds.insert(round);

    Ok(outcomes)
}

/// Linear speed bonus: full `max_bonus` for an instantaneous answer, decaying
/// to zero at the end of the configured window.
fn speed_bonus_points(bonus: &SpeedBonus, response_time_ms: u64) -> u32 {
    if bonus.window_ms == 0 || response_time_ms >= bonus.window_ms {
        return 0;
    }
    let remaining = bonus.window_ms - response_time_ms;
    (u64::from(bonus.max_bonus) * remaining / bonus.window_ms) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::battle::{Choice, ChoiceColor, Question, Student};

    fn question(correct_index: usize) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: "2 + 2 = ?".into(),
            choices: (0..4)
                .map(|slot| Choice {
                    label: format!("{slot}"),
                    color: ChoiceColor::for_slot(slot),
                })
                .collect(),
            correct_index,
        }
    }

    fn session_with_groups(groups: usize) -> (BattleSession, Vec<Uuid>) {
        let mut session = BattleSession::new(
            "math battle".into(),
            Uuid::new_v4(),
            vec![question(0), question(1)],
            None,
        );
        let ids = (0..groups)
            .map(|n| {
                let id = Uuid::new_v4();
                session.add_group(
                    id,
                    format!("group {n}"),
                    format!("CODE{n}A"),
                    vec![
                        Student {
                            id: Uuid::new_v4(),
                            name: "a".into(),
                        },
                        Student {
                            id: Uuid::new_v4(),
                            name: "b".into(),
                        },
                    ],
                );
                id
            })
            .collect();
        (session, ids)
    }

    #[test]
    fn flat_rate_scoring_awards_points_for_correct_only() {
        let (mut session, ids) = session_with_groups(2);
        let config = AppConfig::default();

        session.record_attempt(ids[0], 0, 0, 800).unwrap();
        session.record_attempt(ids[1], 0, 3, 200).unwrap();

        let outcomes = score_round(&mut session, 0, &config).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].correct);
        assert_eq!(outcomes[0].awarded, config.points_per_correct);
        assert!(!outcomes[1].correct);
        assert_eq!(outcomes[1].awarded, 0);

        assert_eq!(session.groups[&ids[0]].score, config.points_per_correct);
        assert_eq!(session.groups[&ids[0]].correct_count, 1);
        assert_eq!(session.groups[&ids[1]].score, 0);
    }

    #[test]
    fn groups_that_never_answered_get_zero() {
        let (mut session, ids) = session_with_groups(2);
        session.record_attempt(ids[0], 0, 0, 100).unwrap();

        let outcomes = score_round(&mut session, 0, &AppConfig::default()).unwrap();
        let silent = outcomes.iter().find(|o| o.group_id == ids[1]).unwrap();
        assert_eq!(silent.choice_index, None);
        assert_eq!(silent.awarded, 0);
    }

    #[test]
    fn scoring_twice_fails_and_scores_are_unchanged() {
        let (mut session, ids) = session_with_groups(1);
        let config = AppConfig::default();
        session.record_attempt(ids[0], 0, 0, 100).unwrap();

        score_round(&mut session, 0, &config).unwrap();
        let score_after_first = session.groups[&ids[0]].score;

        let err = score_round(&mut session, 0, &config).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyScored { round: 0 }));
        assert_eq!(session.groups[&ids[0]].score, score_after_first);
    }

    #[test]
    fn rounds_are_scored_independently() {
        let (mut session, ids) = session_with_groups(1);
        let config = AppConfig::default();

        session.record_attempt(ids[0], 0, 0, 100).unwrap();
        session.record_attempt(ids[0], 1, 1, 100).unwrap();

        score_round(&mut session, 0, &config).unwrap();
        score_round(&mut session, 1, &config).unwrap();
        assert_eq!(session.groups[&ids[0]].score, 2 * config.points_per_correct);
        assert_eq!(session.groups[&ids[0]].correct_count, 2);
    }

    #[test]
    fn speed_bonus_decays_linearly_when_configured() {
        let bonus = SpeedBonus {
            max_bonus: 50,
            window_ms: 10_000,
        };
        assert_eq!(speed_bonus_points(&bonus, 0), 50);
        assert_eq!(speed_bonus_points(&bonus, 5_000), 25);
        assert_eq!(speed_bonus_points(&bonus, 10_000), 0);
        assert_eq!(speed_bonus_points(&bonus, 60_000), 0);
    }

    #[test]
    fn speed_bonus_applies_only_to_correct_answers() {
        let (mut session, ids) = session_with_groups(2);
        let config = AppConfig {
            speed_bonus: Some(SpeedBonus {
                max_bonus: 50,
                window_ms: 10_000,
            }),
            ..AppConfig::default()
        };

        session.record_attempt(ids[0], 0, 0, 5_000).unwrap();
        session.record_attempt(ids[1], 0, 2, 0).unwrap();

        let outcomes = score_round(&mut session, 0, &config).unwrap();
        assert_eq!(outcomes[0].awarded, config.points_per_correct + 25);
        assert_eq!(outcomes[1].awarded, 0);
    }
}
