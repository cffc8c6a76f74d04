//! Caller identity injected by the outer authentication layer. The engine
//! never validates credentials; it only reads the already-authenticated
//! identity headers and role-gates the teacher-only commands.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::{AppError, ServiceError};

/// Header carrying the authenticated user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Can create battles and drive their lifecycle.
    Teacher,
    /// Can join groups and submit answers.
    Student,
}

/// Authenticated caller identity as asserted by the surrounding application.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    /// Authenticated user identifier.
    pub user_id: Uuid,
    /// Authenticated role.
    pub role: Role,
}

impl Identity {
    /// Reject callers that do not hold the teacher role.
    pub fn require_teacher(&self) -> Result<(), ServiceError> {
        match self.role {
            Role::Teacher => Ok(()),
            Role::Student => Err(ServiceError::Unauthorized(
                "this command requires the teacher role".into(),
            )),
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("missing or invalid {USER_ID_HEADER} header"))
            })?;

        let role = match parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some("teacher") => Role::Teacher,
            Some("student") => Role::Student,
            _ => {
                return Err(AppError::Unauthorized(format!(
                    "missing or invalid {USER_ROLE_HEADER} header"
                )));
            }
        };

        Ok(Self { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_are_rejected_from_teacher_commands() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Student,
        };
        assert!(matches!(
            identity.require_teacher(),
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn teachers_pass_the_role_gate() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        assert!(identity.require_teacher().is_ok());
    }
}
