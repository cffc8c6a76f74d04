use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases a battle can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Join window: groups can register, no round is running.
    Pending,
    /// Battle is live and stepping through its rounds.
    Active(RoundPhase),
    /// Terminal phase: standings are final, every mutation is rejected.
    Finished,
}

/// Fine-grained round state while the battle is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// The question at `index` is open for answers.
    Open {
        /// Index of the open round.
        index: usize,
    },
    /// The round at `index` has been closed and scored, awaiting advance.
    Closed {
        /// Index of the closed round.
        index: usize,
    },
}

/// Events that can be applied to the battle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleEvent {
    /// Teacher starts the battle; round 0 opens.
    Start,
    /// The current open round closes (operator action or timer).
    CloseRound,
    /// Move from a closed round to the next open round.
    OpenNext,
    /// The last round closed; the battle is over.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: BattlePhase,
    /// The event that cannot be applied from this phase.
    pub event: BattleEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: BattlePhase,
        /// Current phase.
        actual: BattlePhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: BattlePhase,
    /// Phase the state machine will transition to.
    pub to: BattlePhase,
    /// Event that triggered this transition.
    pub event: BattleEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Current phase of the state machine.
    pub phase: BattlePhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<BattlePhase>,
}

/// State machine driving one battle's strictly-forward lifecycle.
#[derive(Debug, Clone)]
pub struct BattleStateMachine {
    phase: BattlePhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for BattleStateMachine {
    fn default() -> Self {
        Self {
            phase: BattlePhase::Pending,
            version: 0,
            pending: None,
        }
    }
}

impl BattleStateMachine {
    /// Create a new state machine initialised in the pending (join window) phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// Index of the round currently referenced by the phase, if any.
    pub fn round_index(&self) -> Option<usize> {
        match self.phase {
            BattlePhase::Active(RoundPhase::Open { index })
            | BattlePhase::Active(RoundPhase::Closed { index }) => Some(index),
            _ => None,
        }
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: BattleEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<BattlePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    ///
    /// Phases only move forward: pending battles start, open rounds close,
    /// closed rounds either open the next index or finish the battle.
    fn compute_transition(&self, event: BattleEvent) -> Result<BattlePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (BattlePhase::Pending, BattleEvent::Start) => {
                BattlePhase::Active(RoundPhase::Open { index: 0 })
            }
            (BattlePhase::Active(RoundPhase::Open { index }), BattleEvent::CloseRound) => {
                BattlePhase::Active(RoundPhase::Closed { index })
            }
            (BattlePhase::Active(RoundPhase::Closed { index }), BattleEvent::OpenNext) => {
                BattlePhase::Active(RoundPhase::Open { index: index + 1 })
            }
            (BattlePhase::Active(RoundPhase::Closed { .. }), BattleEvent::Finish) => {
                BattlePhase::Finished
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut BattleStateMachine, event: BattleEvent) -> BattlePhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_pending() {
        let sm = BattleStateMachine::new();
        assert_eq!(sm.phase(), BattlePhase::Pending);
        assert_eq!(sm.round_index(), None);
    }

    #[test]
    fn full_happy_path_through_two_rounds() {
        let mut sm = BattleStateMachine::new();

        assert_eq!(
            apply(&mut sm, BattleEvent::Start),
            BattlePhase::Active(RoundPhase::Open { index: 0 })
        );
        assert_eq!(
            apply(&mut sm, BattleEvent::CloseRound),
            BattlePhase::Active(RoundPhase::Closed { index: 0 })
        );
        assert_eq!(
            apply(&mut sm, BattleEvent::OpenNext),
            BattlePhase::Active(RoundPhase::Open { index: 1 })
        );
        assert_eq!(
            apply(&mut sm, BattleEvent::CloseRound),
            BattlePhase::Active(RoundPhase::Closed { index: 1 })
        );
        assert_eq!(apply(&mut sm, BattleEvent::Finish), BattlePhase::Finished);
    }

    #[test]
    fn round_index_only_increases() {
        let mut sm = BattleStateMachine::new();
        apply(&mut sm, BattleEvent::Start);

        let mut last = sm.round_index().unwrap();
        for _ in 0..5 {
            apply(&mut sm, BattleEvent::CloseRound);
            apply(&mut sm, BattleEvent::OpenNext);
            let current = sm.round_index().unwrap();
            assert!(current > last);
            last = current;
        }
    }

    #[test]
    fn close_requires_an_open_round() {
        let mut sm = BattleStateMachine::new();
        let err = sm.plan(BattleEvent::CloseRound).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, BattlePhase::Pending);
                assert_eq!(invalid.event, BattleEvent::CloseRound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn double_close_is_rejected_by_the_machine() {
        let mut sm = BattleStateMachine::new();
        apply(&mut sm, BattleEvent::Start);
        apply(&mut sm, BattleEvent::CloseRound);

        let err = sm.plan(BattleEvent::CloseRound).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTransition(_)));
    }

    #[test]
    fn finished_is_terminal() {
        let mut sm = BattleStateMachine::new();
        apply(&mut sm, BattleEvent::Start);
        apply(&mut sm, BattleEvent::CloseRound);
        apply(&mut sm, BattleEvent::Finish);

        for event in [
            BattleEvent::Start,
            BattleEvent::CloseRound,
            BattleEvent::OpenNext,
            BattleEvent::Finish,
        ] {
            assert!(matches!(
                sm.plan(event),
                Err(PlanError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn planning_twice_without_applying_fails() {
        let mut sm = BattleStateMachine::new();
        sm.plan(BattleEvent::Start).unwrap();
        assert_eq!(
            sm.plan(BattleEvent::Start).unwrap_err(),
            PlanError::AlreadyPending
        );
    }

    #[test]
    fn apply_with_wrong_plan_id_keeps_pending() {
        let mut sm = BattleStateMachine::new();
        let plan = sm.plan(BattleEvent::Start).unwrap();

        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        match err {
            ApplyError::IdMismatch { expected, .. } => assert_eq!(expected, plan.id),
            other => panic!("unexpected error: {other:?}"),
        }

        // The original plan can still be applied afterwards.
        assert_eq!(
            sm.apply(plan.id).unwrap(),
            BattlePhase::Active(RoundPhase::Open { index: 0 })
        );
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = BattleStateMachine::new();
        let plan = sm.plan(BattleEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), BattlePhase::Pending);
    }

    #[test]
    fn snapshot_reports_pending_target() {
        let mut sm = BattleStateMachine::new();
        let plan = sm.plan(BattleEvent::Start).unwrap();

        let snapshot = sm.snapshot();
        assert_eq!(snapshot.phase, BattlePhase::Pending);
        assert_eq!(
            snapshot.pending,
            Some(BattlePhase::Active(RoundPhase::Open { index: 0 }))
        );

        sm.apply(plan.id).unwrap();
        assert_eq!(sm.snapshot().pending, None);
        assert_eq!(sm.snapshot().version, 1);
    }
}
