use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::battle::{BattleSession, ChoiceColor, Group, Question, Student},
};

/// Public projection of one answer choice (label and rendering color only).
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ChoiceSnapshot {
    /// Text shown for this choice.
    pub label: String,
    /// Palette color tagged onto this choice's slot.
    pub color: ChoiceColor,
}

/// Projection of the currently open question pushed to clients. The correct
/// index is deliberately absent; it is only revealed once the round closes.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct OpenQuestion {
    /// Round index this question is open for.
    pub round_index: usize,
    /// Question-bank identifier.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Ordered answer choices.
    pub choices: Vec<ChoiceSnapshot>,
    /// RFC3339 timestamp when the round opened; absent until a round is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    /// Maximum round duration in seconds, when an auto-close timer is armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<u64>,
}

impl OpenQuestion {
    /// Build the public projection of the question open at `round_index`.
    pub fn from_session(session: &BattleSession, round_index: usize) -> Option<Self> {
        let question = session.question(round_index)?;
        let opened_at = session.round_opened_at.map(format_system_time);

        Some(Self {
            round_index,
            id: question.id,
            text: question.text.clone(),
            choices: question.choices.iter().map(Into::into).collect(),
            opened_at,
            deadline_seconds: session.round_seconds,
        })
    }
}

impl From<&crate::state::battle::Choice> for ChoiceSnapshot {
    fn from(choice: &crate::state::battle::Choice) -> Self {
        Self {
            label: choice.label.clone(),
            color: choice.color,
        }
    }
}

/// One student on a group summary.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct StudentSummary {
    /// Student identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            name: student.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
/// Public projection of a group exposed to REST/SSE clients.
pub struct GroupSummary {
    /// Group identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Cumulative score.
    pub score: u32,
    /// Cumulative correct-answer count.
    pub correct_count: u32,
    /// Roster of students.
    pub students: Vec<StudentSummary>,
}

impl From<(Uuid, &Group)> for GroupSummary {
    fn from((id, group): (Uuid, &Group)) -> Self {
        Self {
            id,
            name: group.name.clone(),
            score: group.score,
            correct_count: group.correct_count,
            students: group.students.iter().map(Into::into).collect(),
        }
    }
}

/// Reveal projection of a question, including the correct index. Only used in
/// round-closed payloads.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct RevealedQuestion {
    /// Question-bank identifier.
    pub id: Uuid,
    /// Question text.
    pub text: String,
    /// Ordered answer choices.
    pub choices: Vec<ChoiceSnapshot>,
    /// Index of the correct choice.
    pub correct_index: usize,
}

impl From<&Question> for RevealedQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            choices: question.choices.iter().map(Into::into).collect(),
            correct_index: question.correct_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::state::battle::Choice;

    fn sample_session() -> BattleSession {
        BattleSession::new(
            "capitals".into(),
            Uuid::new_v4(),
            vec![Question {
                id: Uuid::new_v4(),
                text: "Capital of Peru?".into(),
                choices: (0..4)
                    .map(|slot| Choice {
                        label: format!("choice {slot}"),
                        color: ChoiceColor::for_slot(slot),
                    })
                    .collect(),
                correct_index: 1,
            }],
            None,
        )
    }

    #[test]
    fn open_question_omits_opened_at_until_a_round_opens() {
        let mut session = sample_session();

        let projection = OpenQuestion::from_session(&session, 0).unwrap();
        assert_eq!(projection.opened_at, None);

        session.round_opened_at = Some(SystemTime::now());
        let projection = OpenQuestion::from_session(&session, 0).unwrap();
        let opened_at = projection.opened_at.unwrap();
        assert!(!opened_at.is_empty());

        let json = serde_json::to_value(OpenQuestion::from_session(&session, 0).unwrap()).unwrap();
        assert!(json.get("opened_at").is_some());
    }

    #[test]
    fn open_question_never_carries_the_correct_index() {
        let session = sample_session();
        let json = serde_json::to_value(OpenQuestion::from_session(&session, 0).unwrap()).unwrap();
        assert!(json.get("correct_index").is_none());
        assert!(json.get("opened_at").is_none());
    }
}
