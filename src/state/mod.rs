pub mod battle;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig, error::ServiceError, services::round_timer::RoundTimer,
    state::battle::BattleSession,
};

pub use self::sse::EventHub;
pub use self::state_machine::{
    AbortError, ApplyError, BattleEvent, BattlePhase, BattleStateMachine, MachineSnapshot, Plan,
    PlanError, PlanId, RoundPhase,
};

/// Shared handle to the process-wide application state.
pub type SharedState = Arc<AppState>;

/// Upper bound on how long a transition's work section may run before the plan
/// is aborted and the command fails.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Broadcast channel capacity per battle event hub.
const EVENT_HUB_CAPACITY: usize = 64;

/// Target of a join code in the global code index.
#[derive(Debug, Clone, Copy)]
pub struct JoinCodeEntry {
    /// Battle the code belongs to.
    pub battle_id: Uuid,
    /// Group the code resolves to.
    pub group_id: Uuid,
}

/// Central application state: the registry of independently-lockable battles
/// plus the global join-code index.
///
/// Operations on different battles never contend; all synchronisation is
/// scoped to the individual [`BattleHandle`].
pub struct AppState {
    config: Arc<AppConfig>,
    battles: DashMap<Uuid, Arc<BattleHandle>>,
    join_codes: DashMap<String, JoinCodeEntry>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            battles: DashMap::new(),
            join_codes: DashMap::new(),
        })
    }

    /// Policy configuration shared across the application.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register a freshly created battle and return its handle.
    pub fn register_battle(&self, session: BattleSession) -> Arc<BattleHandle> {
        let handle = Arc::new(BattleHandle::new(session));
        self.battles.insert(handle.id(), handle.clone());
        handle
    }

    /// Look up a battle by identifier.
    pub fn battle(&self, id: Uuid) -> Result<Arc<BattleHandle>, ServiceError> {
        self.battles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ServiceError::UnknownBattle(id))
    }

    /// Number of battles currently registered.
    pub fn battle_count(&self) -> usize {
        self.battles.len()
    }

    /// Handles of every registered battle, for listing projections.
    pub fn battle_handles(&self) -> Vec<Arc<BattleHandle>> {
        self.battles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Reserve a join code, returning false when the code is already taken.
    pub fn claim_join_code(&self, code: &str, entry: JoinCodeEntry) -> bool {
        match self.join_codes.entry(code.to_string()) {
            dashmap::Entry::Occupied(_) => false,
            dashmap::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Resolve a join code to its (battle, group) pair.
    pub fn resolve_join_code(&self, code: &str) -> Option<JoinCodeEntry> {
        self.join_codes.get(code).map(|entry| *entry.value())
    }

    /// Release a reserved join code after a failed registration.
    pub fn release_join_code(&self, code: &str) {
        self.join_codes.remove(code);
    }
}

/// One battle's unit of mutable state: session data, phase machine, the
/// single-writer gate serialising mutations, the event hub, and the slot for
/// the round auto-close timer.
pub struct BattleHandle {
    id: Uuid,
    session: RwLock<BattleSession>,
    machine: RwLock<BattleStateMachine>,
    events: EventHub,
    timer: Mutex<Option<RoundTimer>>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl BattleHandle {
    fn new(session: BattleSession) -> Self {
        Self {
            id: session.id,
            session: RwLock::new(session),
            machine: RwLock::new(BattleStateMachine::new()),
            events: EventHub::new(EVENT_HUB_CAPACITY),
            timer: Mutex::new(None),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        }
    }

    /// Identifier of the battle this handle owns.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Broadcast hub carrying this battle's event stream.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Snapshot the current phase of the battle state machine.
    pub async fn phase(&self) -> BattlePhase {
        self.machine.read().await.phase()
    }

    /// Snapshot the state machine including version and pending plan.
    pub async fn machine_snapshot(&self) -> MachineSnapshot {
        self.machine.read().await.snapshot()
    }

    /// Run a read-only projection over the session data without entering the
    /// single-writer section.
    pub async fn read_session<F, T>(&self, read: F) -> T
    where
        F: FnOnce(&BattleSession) -> T,
    {
        let guard = self.session.read().await;
        read(&guard)
    }

    /// Mutate the session data. Callers inside a transition's work section
    /// already hold the writer gate; everyone else must use [`Self::mutate`].
    pub async fn with_session_mut<F, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut BattleSession) -> Result<T, ServiceError>,
    {
        let mut guard = self.session.write().await;
        work(&mut guard)
    }

    /// Serialize a non-transition mutation (join, submit) against every other
    /// mutating command of this battle. The closure receives the phase as
    /// observed under the gate, so phase checks and the mutation commit
    /// atomically with respect to concurrent closes and advances.
    pub async fn mutate<F, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut BattleSession, BattlePhase) -> Result<T, ServiceError>,
    {
        let _gate = self.transition_gate.lock().await;
        let phase = self.machine.read().await.phase();
        let mut guard = self.session.write().await;
        work(&mut guard, phase)
    }

    /// Install the auto-close timer for the newly opened round, cancelling any
    /// stale one.
    pub async fn install_timer(&self, timer: RoundTimer) {
        debug!(battle_id = %self.id, round_index = timer.round_index(), "round timer armed");
        let mut slot = self.timer.lock().await;
        if let Some(previous) = slot.replace(timer) {
            debug!(
                battle_id = %self.id,
                round_index = previous.round_index(),
                "stale round timer cancelled"
            );
            previous.cancel();
        }
    }

    /// Cancel and drop the active round timer, if any.
    pub async fn cancel_timer(&self) {
        let mut slot = self.timer.lock().await;
        if let Some(timer) = slot.take() {
            timer.cancel();
        }
    }

    /// Plan a transition on the battle state machine, returning the plan.
    async fn plan_transition(&self, event: BattleEvent) -> Result<Plan, PlanError> {
        let mut machine = self.machine.write().await;
        machine.plan(event)
    }

    /// Apply the planned transition, returning the next phase.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<BattlePhase, ApplyError> {
        let mut machine = self.machine.write().await;
        machine.apply(plan_id)
    }

    /// Abort a planned transition of the battle state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut machine = self.machine.write().await;
        machine.abort(plan_id)
    }

    /// Run `work` inside a planned phase transition, holding the battle's
    /// writer gate for the whole validate-work-apply sequence. The transition
    /// is aborted when the work fails or exceeds the timeout, leaving the
    /// phase untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: BattleEvent,
        work: F,
    ) -> Result<(T, BattlePhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            battle_id = %self.id,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        battle_id = %self.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
