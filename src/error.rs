use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::state::{AbortError, ApplyError, PlanError};

/// Errors returned by the battle engine's command surface. Every failed
/// mutation is a no-op on state and surfaces as one of these variants.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller is not allowed to perform this command.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Input is malformed beyond the dedicated variants below.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation is not valid in the battle's current phase.
    #[error("invalid phase: {0}")]
    InvalidPhase(String),
    /// The battle reached its terminal phase; no further mutation succeeds.
    #[error("battle is finished")]
    BattleFinished,
    /// The round for the submitted question is not open.
    #[error("round is closed for question {question_index}")]
    RoundClosed {
        /// Question the submission targeted.
        question_index: usize,
    },
    /// A second attempt was submitted for the same (group, question) pair.
    #[error("group `{group_id}` already answered question {question_index}")]
    DuplicateAnswer {
        /// Group that re-submitted.
        group_id: Uuid,
        /// Question the duplicate targeted.
        question_index: usize,
    },
    /// A round's scores were committed twice.
    #[error("round {round} has already been scored")]
    AlreadyScored {
        /// Round index whose scoring was retried.
        round: usize,
    },
    /// The chosen answer index is outside the question's choice range.
    #[error("choice index {index} out of range ({choices} choices)")]
    InvalidChoice {
        /// Submitted choice index.
        index: usize,
        /// Number of choices the question offers.
        choices: usize,
    },
    /// Roster size is outside the configured per-group bounds.
    #[error("invalid roster size {size}: expected between {min} and {max} students")]
    InvalidRoster {
        /// Submitted roster size.
        size: usize,
        /// Minimum students per group.
        min: usize,
        /// Maximum students per group.
        max: usize,
    },
    /// Question count is outside the configured round bounds.
    #[error("invalid question count {count}: expected between {min} and {max}")]
    InvalidQuestionCount {
        /// Submitted question count.
        count: usize,
        /// Minimum rounds per battle.
        min: usize,
        /// Maximum rounds per battle.
        max: usize,
    },
    /// The battle already holds the maximum number of groups.
    #[error("battle already has the maximum of {max} groups")]
    CapacityExceeded {
        /// Configured group limit.
        max: usize,
    },
    /// Too few groups joined to start the battle.
    #[error("cannot start with {count} groups: at least {min} required")]
    InsufficientGroups {
        /// Registered group count.
        count: usize,
        /// Minimum viable group count.
        min: usize,
    },
    /// No battle registered under this identifier.
    #[error("battle `{0}` not found")]
    UnknownBattle(Uuid),
    /// The submission references a group that never joined this battle.
    #[error("group `{0}` not found in this battle")]
    UnknownGroup(Uuid),
    /// The submission references a question index outside the battle's set.
    #[error("question index {0} not found in this battle")]
    UnknownQuestion(usize),
    /// Generic lookup failure (join codes).
    #[error("not found: {0}")]
    NotFound(String),
    /// A transition's work section exceeded its time limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unauthorized(_) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(_)
            | ServiceError::InvalidChoice { .. }
            | ServiceError::InvalidRoster { .. }
            | ServiceError::InvalidQuestionCount { .. } => AppError::BadRequest(message),
            ServiceError::InvalidPhase(_)
            | ServiceError::BattleFinished
            | ServiceError::RoundClosed { .. }
            | ServiceError::DuplicateAnswer { .. }
            | ServiceError::AlreadyScored { .. }
            | ServiceError::CapacityExceeded { .. }
            | ServiceError::InsufficientGroups { .. } => AppError::Conflict(message),
            ServiceError::UnknownBattle(_)
            | ServiceError::UnknownGroup(_)
            | ServiceError::UnknownQuestion(_)
            | ServiceError::NotFound(_) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidPhase("state transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => ServiceError::InvalidPhase(invalid.to_string()),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidPhase("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidPhase("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidPhase(format!(
                "state changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => ServiceError::InvalidPhase(format!(
                "state version mismatch during transition (expected {expected}, got {actual})"
            )),
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidPhase("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidPhase("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_conflicts_map_to_conflict() {
        for err in [
            ServiceError::BattleFinished,
            ServiceError::RoundClosed { question_index: 0 },
            ServiceError::DuplicateAnswer {
                group_id: Uuid::new_v4(),
                question_index: 1,
            },
            ServiceError::AlreadyScored { round: 2 },
            ServiceError::CapacityExceeded { max: 10 },
        ] {
            assert!(matches!(AppError::from(err), AppError::Conflict(_)));
        }
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        for err in [
            ServiceError::InvalidRoster {
                size: 1,
                min: 2,
                max: 10,
            },
            ServiceError::InvalidQuestionCount {
                count: 3,
                min: 5,
                max: 20,
            },
            ServiceError::InvalidChoice {
                index: 4,
                choices: 4,
            },
        ] {
            assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
        }
    }

    #[test]
    fn lookups_map_to_not_found() {
        assert!(matches!(
            AppError::from(ServiceError::UnknownBattle(Uuid::new_v4())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(ServiceError::UnknownQuestion(9)),
            AppError::NotFound(_)
        ));
    }
}
