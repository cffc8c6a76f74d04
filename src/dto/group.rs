use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::GroupSummary;

/// Payload a group submits to join a pending battle.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGroupRequest {
    /// Display name of the group.
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    /// Roster of students forming the group.
    #[validate(nested)]
    pub students: Vec<StudentInput>,
}

/// One student on an incoming roster.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StudentInput {
    /// Identity supplied by the outer auth layer; generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Display name.
    #[validate(length(min = 1, max = 60))]
    pub name: String,
}

/// Response returned to the joining group. The join code is only handed out
/// here; summaries broadcast to other clients never carry it.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinGroupResponse {
    /// Battle the group joined.
    pub battle_id: Uuid,
    /// Collision-free code the group's devices use to re-attach.
    pub join_code: String,
    /// Public projection of the new group.
    pub group: GroupSummary,
}

/// Response resolving a join code back to its battle and group.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResolveJoinCodeResponse {
    /// Battle the code belongs to.
    pub battle_id: Uuid,
    /// Public projection of the resolved group.
    pub group: GroupSummary,
}
