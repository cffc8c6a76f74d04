//! Group registry: admits groups during the join window, hands out
//! collision-free join codes, and resolves codes back to their group.

use rand::Rng;
use uuid::Uuid;

use crate::{
    dto::{
        common::GroupSummary,
        group::{JoinGroupRequest, JoinGroupResponse, ResolveJoinCodeResponse},
        validation::{JOIN_CODE_ALPHABET, JOIN_CODE_LENGTH},
    },
    error::ServiceError,
    services::sse_events,
    state::{BattlePhase, JoinCodeEntry, SharedState, battle::Student},
};

/// Register a new group on a pending battle.
///
/// The join code is reserved in the global index before the session mutation,
/// so two groups can never end up sharing a code; a failed registration
/// releases the reservation. Admission is atomic with the capacity check
/// inside the battle's writer section, so the group limit holds under
/// concurrent joins.
pub async fn join_battle(
    state: &SharedState,
    battle_id: Uuid,
    request: JoinGroupRequest,
) -> Result<JoinGroupResponse, ServiceError> {
    let config = state.config();
    let roster_size = request.students.len();
    if roster_size < config.min_students_per_group || roster_size > config.max_students_per_group {
        return Err(ServiceError::InvalidRoster {
            size: roster_size,
            min: config.min_students_per_group,
            max: config.max_students_per_group,
        });
    }

    let handle = state.battle(battle_id)?;

    let group_id = Uuid::new_v4();
    let join_code = reserve_join_code(state, battle_id, group_id);

    let students: Vec<Student> = request
        .students
        .into_iter()
        .map(|student| Student {
            id: student.id.unwrap_or_else(Uuid::new_v4),
            name: student.name,
        })
        .collect();

    let max_groups = config.max_groups;
    let group_name = request.name;
    let code_for_session = join_code.clone();
    let admitted = handle
        .mutate(move |session, phase| {
            match phase {
                BattlePhase::Pending => {}
                BattlePhase::Active(_) => {
                    return Err(ServiceError::InvalidPhase(
                        "groups can only join before the battle starts".into(),
                    ));
                }
                BattlePhase::Finished => return Err(ServiceError::BattleFinished),
            }

            if session.groups.len() >= max_groups {
                return Err(ServiceError::CapacityExceeded { max: max_groups });
            }

            session.add_group(group_id, group_name, code_for_session, students);
            let group = &session.groups[&group_id];
            Ok(GroupSummary::from((group_id, group)))
        })
        .await;

    let group = match admitted {
        Ok(group) => group,
        Err(err) => {
            state.release_join_code(&join_code);
            return Err(err);
        }
    };

    sse_events::broadcast_group_update(&handle, group.clone());

    Ok(JoinGroupResponse {
        battle_id,
        join_code,
        group,
    })
}

/// Resolve a join code to its battle and group projection.
pub async fn resolve_join_code(
    state: &SharedState,
    code: &str,
) -> Result<ResolveJoinCodeResponse, ServiceError> {
    let entry = state
        .resolve_join_code(code)
        .ok_or_else(|| ServiceError::NotFound(format!("join code `{code}` is not registered")))?;

    let handle = state.battle(entry.battle_id)?;
    let group = handle
        .read_session(|session| {
            session
                .groups
                .get(&entry.group_id)
                .map(|group| GroupSummary::from((entry.group_id, group)))
        })
        .await
        .ok_or(ServiceError::UnknownGroup(entry.group_id))?;

    Ok(ResolveJoinCodeResponse {
        battle_id: entry.battle_id,
        group,
    })
}

/// Sample codes until one claims a free slot in the global index. Collisions
/// are rare at this alphabet size, so the loop almost always runs once.
fn reserve_join_code(state: &SharedState, battle_id: Uuid, group_id: Uuid) -> String {
    let entry = JoinCodeEntry {
        battle_id,
        group_id,
    };
    loop {
        let code = random_join_code();
        if state.claim_join_code(&code, entry) {
            return code;
        }
    }
}

fn random_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LENGTH)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}
