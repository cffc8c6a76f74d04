use std::collections::HashSet;
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ServiceError;

/// Fixed palette used to tag answer choices for client rendering. Choices are
/// colored by slot index, so every battle renders choice 0 the same way.
pub const CHOICE_PALETTE: [ChoiceColor; 6] = [
    ChoiceColor::Red,
    ChoiceColor::Blue,
    ChoiceColor::Green,
    ChoiceColor::Yellow,
    ChoiceColor::Purple,
    ChoiceColor::Orange,
];

/// Rendering color attached to one answer-choice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceColor {
    /// Slot 0.
    Red,
    /// Slot 1.
    Blue,
    /// Slot 2.
    Green,
    /// Slot 3.
    Yellow,
    /// Slot 4.
    Purple,
    /// Slot 5.
    Orange,
}

impl ChoiceColor {
    /// Color assigned to the answer-choice slot at `index`, wrapping when the
    /// palette is exhausted.
    pub fn for_slot(index: usize) -> Self {
        CHOICE_PALETTE[index % CHOICE_PALETTE.len()]
    }
}

/// One selectable answer choice of a question.
#[derive(Debug, Clone)]
pub struct Choice {
    /// Text shown for this choice.
    pub label: String,
    /// Palette color assigned to this choice's slot.
    pub color: ChoiceColor,
}

/// A question attached to a battle. Immutable once the battle is created.
#[derive(Debug, Clone)]
pub struct Question {
    /// Stable identifier supplied by the question bank.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Ordered answer choices.
    pub choices: Vec<Choice>,
    /// Index of the correct choice; never exposed while the round is open.
    pub correct_index: usize,
}

/// One student on a group roster.
#[derive(Debug, Clone)]
pub struct Student {
    /// Stable identifier supplied by the outer identity layer.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// A team of students sharing one scoring identity within a battle.
#[derive(Debug, Clone)]
pub struct Group {
    /// Display name chosen at join time.
    pub name: String,
    /// Short token clients use to attach to this group.
    pub join_code: String,
    /// Roster of participating students.
    pub students: Vec<Student>,
    /// Cumulative score; only ever increases.
    pub score: u32,
    /// Cumulative count of correctly answered rounds.
    pub correct_count: u32,
}

/// One group's recorded response to one question. Append-only.
#[derive(Debug, Clone)]
pub struct AnswerAttempt {
    /// Group that submitted the answer.
    pub group_id: Uuid,
    /// Round index the answer was submitted for.
    pub question_index: usize,
    /// Chosen answer-choice index.
    pub choice_index: usize,
    /// Client-measured response latency in milliseconds.
    pub response_time_ms: u64,
    /// Server timestamp when the attempt was accepted.
    pub accepted_at: SystemTime,
}

/// Aggregated mutable state for one battle, owned by its [`super::BattleHandle`]
/// and mutated only inside the battle's single-writer section.
#[derive(Debug, Clone)]
pub struct BattleSession {
    /// Primary key of the battle.
    pub id: Uuid,
    /// Display name of the battle.
    pub name: String,
    /// Teacher who created the battle; start/close/advance are gated on it.
    pub owner_id: Uuid,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Stamped when the battle leaves the join window.
    pub started_at: Option<SystemTime>,
    /// Stamped when the battle reaches the terminal phase.
    pub ended_at: Option<SystemTime>,
    /// Optional maximum round duration before the auto-close timer fires.
    pub round_seconds: Option<u64>,
    /// Frozen, ordered question list.
    pub questions: Vec<Question>,
    /// Registered groups in join order.
    pub groups: IndexMap<Uuid, Group>,
    /// Answer ledger keyed by (group, question); at most one entry per key.
    pub answers: IndexMap<(Uuid, usize), AnswerAttempt>,
    /// Round indices whose scores have been committed.
    pub scored_rounds: HashSet<usize>,
    /// Open timestamp of the currently open round, if any.
    pub round_opened_at: Option<SystemTime>,
}

impl BattleSession {
    /// Build a new in-memory battle around a frozen question list.
    pub fn new(
        name: String,
        owner_id: Uuid,
        questions: Vec<Question>,
        round_seconds: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            owner_id,
            created_at: SystemTime::now(),
            started_at: None,
            ended_at: None,
            round_seconds,
            questions,
            groups: IndexMap::new(),
            answers: IndexMap::new(),
            scored_rounds: HashSet::new(),
            round_opened_at: None,
        }
    }

    /// Number of rounds this battle plays (one per question).
    pub fn round_count(&self) -> usize {
        self.questions.len()
    }

    /// Question backing the round at `index`.
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Register a new group under the caller-supplied identifier.
    ///
    /// Capacity and roster bounds are policy checks performed by the caller;
    /// the registration itself is immediately visible to the group-count check.
    pub fn add_group(
        &mut self,
        group_id: Uuid,
        name: String,
        join_code: String,
        students: Vec<Student>,
    ) -> Uuid {
        self.groups.insert(
            group_id,
            Group {
                name,
                join_code,
                students,
                score: 0,
                correct_count: 0,
            },
        );
        group_id
    }

    /// Append an answer attempt, enforcing the one-attempt-per-(group, question)
    /// invariant through the ledger key itself.
    pub fn record_attempt(
        &mut self,
        group_id: Uuid,
        question_index: usize,
        choice_index: usize,
        response_time_ms: u64,
    ) -> Result<SystemTime, ServiceError> {
        let question = self
            .questions
            .get(question_index)
            .ok_or(ServiceError::UnknownQuestion(question_index))?;

        if !self.groups.contains_key(&group_id) {
            return Err(ServiceError::UnknownGroup(group_id));
        }

        if choice_index >= question.choices.len() {
            return Err(ServiceError::InvalidChoice {
                index: choice_index,
                choices: question.choices.len(),
            });
        }

        let key = (group_id, question_index);
        if self.answers.contains_key(&key) {
            return Err(ServiceError::DuplicateAnswer {
                group_id,
                question_index,
            });
        }

        let accepted_at = SystemTime::now();
        self.answers.insert(
            key,
            AnswerAttempt {
                group_id,
                question_index,
                choice_index,
                response_time_ms,
                accepted_at,
            },
        );

        Ok(accepted_at)
    }

    /// Look up a recorded attempt.
    pub fn attempt(&self, group_id: Uuid, question_index: usize) -> Option<&AnswerAttempt> {
        self.answers.get(&(group_id, question_index))
    }

    /// All attempts recorded for the round at `index`, in acceptance order.
    pub fn round_attempts(&self, index: usize) -> impl Iterator<Item = &AnswerAttempt> {
        self.answers
            .values()
            .filter(move |attempt| attempt.question_index == index)
    }

    /// Final standings: groups ordered by score, then correct count, then name.
    pub fn standings(&self) -> Vec<(Uuid, &Group)> {
        let mut entries: Vec<(Uuid, &Group)> =
            self.groups.iter().map(|(id, group)| (*id, group)).collect();
        entries.sort_by(|(_, a), (_, b)| {
            b.score
                .cmp(&a.score)
                .then(b.correct_count.cmp(&a.correct_count))
                .then(a.name.cmp(&b.name))
        });
        entries
    }
}
