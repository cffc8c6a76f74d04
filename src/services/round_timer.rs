//! Round auto-close timer. Each open round with a configured duration arms one
//! background task that closes the round when time runs out; explicit closes
//! cancel it, and a timer that loses the race to an explicit close simply
//! observes the already-closed phase and stands down.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::{services::battle_service, state::SharedState};

/// Handle to a pending auto-close task, stored in the battle's timer slot.
#[derive(Debug)]
pub struct RoundTimer {
    round_index: usize,
    handle: JoinHandle<()>,
}

impl RoundTimer {
    /// Round index this timer was armed for.
    pub fn round_index(&self) -> usize {
        self.round_index
    }

    /// Cancel the pending auto-close. Safe to call after the task fired.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Arm the auto-close timer for the round that just opened.
pub fn schedule_auto_close(
    state: SharedState,
    battle_id: Uuid,
    round_index: usize,
    duration: Duration,
) -> RoundTimer {
    let handle = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        debug!(%battle_id, round_index, "round timer fired");
        battle_service::auto_close_round(state, battle_id, round_index).await;
    });

    RoundTimer {
        round_index,
        handle,
    }
}
