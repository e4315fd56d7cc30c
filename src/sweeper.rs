//! Periodic cleanup of rooms nobody is using.

use crate::handlers;
use crate::messages::{GameOverPayload, ServerMessage};
use crate::registry::lock_room;
use crate::server::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Push sent to a room being swept.
pub const IDLE_SWEEP_MESSAGE: &str = "Room expired due to inactivity";

/// Runs forever, sweeping on the configured interval. Spawned once at boot.
pub async fn run(state: Arc<AppState>) {
    let interval = Duration::from_secs(*state.settings.room_sweep_interval_seconds());
    let idle_timeout = Duration::from_secs(*state.settings.idle_room_timeout_seconds());
    info!(?interval, ?idle_timeout, "idle sweeper running");
    loop {
        tokio::time::sleep(interval).await;
        sweep(&state, idle_timeout);
    }
}

/// One sweep pass: close every room that never really started and went
/// quiet, or whose players are all gone.
#[instrument(skip(state))]
pub fn sweep(state: &Arc<AppState>, idle_timeout: Duration) {
    let mut swept = 0usize;
    for code in state.registry.all_codes() {
        let Some(shared) = state.registry.get(&code) else {
            continue;
        };
        let idle = lock_room(&shared).is_idle_for_cleanup(idle_timeout);
        if !idle {
            continue;
        }
        info!(code = %code, "sweeping idle room");
        state.broadcaster.send_to_group(
            &code,
            ServerMessage::GameOver(GameOverPayload::cancelled(&code, IDLE_SWEEP_MESSAGE)),
        );
        handlers::close_room(state, &code);
        swept += 1;
    }
    if swept > 0 {
        debug!(swept, rooms_left = state.registry.len(), "sweep complete");
    }
}
