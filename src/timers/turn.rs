//! The per-turn clock.
//!
//! One countdown exists per room at most, attached to the seat whose mark
//! holds the turn. Disconnects pause it (preserving the remainder),
//! reconnects restart it, expiry forfeits the slow player.

use crate::handlers;
use crate::messages::{GameOverPayload, ServerMessage};
use crate::registry::lock_room;
use crate::room::{Event, PlayerId, Room, TimerHandle};
use crate::server::AppState;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, instrument, warn};

/// Push sent when a player runs out their turn clock.
pub const TURN_TIMEOUT_MESSAGE: &str = "Player timed out on their turn";

/// Starts (or restarts) the turn clock for `code`'s current turn holder.
///
/// Any previous turn timer is cancelled first. A paused remainder, when one
/// was preserved by a disconnect, takes precedence over the configured
/// timeout. No-op when the room is gone, finished, or between games.
#[instrument(skip(state))]
pub fn start_turn_timeout(state: &Arc<AppState>, code: &str) {
    let Some(shared) = state.registry.get(code) else {
        debug!(code, "turn clock not started: room gone");
        return;
    };
    let mut room = lock_room(&shared);
    room.cancel_turn_timers();
    if room.is_game_over {
        return;
    }
    let Some(mark) = room.current_turn else {
        return;
    };
    let default_secs = *state.settings.turn_timeout_seconds();
    let Some(player) = room.player_with_mark_mut(mark) else {
        warn!(code, %mark, "no seat holds the current turn");
        return;
    };

    let player_id = player.player_id.clone();
    let total = player.remaining_turn_seconds.take().unwrap_or(default_secs);
    let expires_at = Utc::now() + chrono::Duration::seconds(total as i64);
    player.turn_expires_at = Some(expires_at);
    player.turn_deadline = Some(Instant::now() + Duration::from_secs(total));

    let version = room.turn_timer_version;
    let timer_id = TimerHandle::next_id();
    debug!(code, player_id = %player_id, total, version, timer_id, "turn clock armed");
    let task = tokio::spawn(run_countdown(
        Arc::clone(state),
        code.to_string(),
        player_id,
        total,
        expires_at,
        version,
        timer_id,
    ));
    if let Some(player) = room.player_with_mark_mut(mark) {
        player.turn_timer = Some(TimerHandle::new(timer_id, task));
    }
}

/// Result of pausing a running turn clock.
#[derive(Debug)]
pub struct PausedTurn {
    /// Seat whose clock was paused.
    pub player_id: PlayerId,
    /// Whole seconds preserved for resumption.
    pub remaining_seconds: u64,
    /// The taken timer; the caller aborts it after releasing the lock.
    pub timer: Option<TimerHandle>,
}

/// Pauses the running turn clock, preserving its remainder.
///
/// Must be called under the room lock. Returns `None` when no turn clock is
/// running. The caller aborts the returned handle outside the lock and
/// broadcasts `TurnCountdownPaused`.
pub fn pause_turn_timer(room: &mut Room, default_secs: u64) -> Option<PausedTurn> {
    let mark = room.current_turn?;
    let player = room.player_with_mark_mut(mark)?;
    player.turn_timer.as_ref()?;

    let remaining_seconds = player
        .turn_deadline
        .map(remaining_whole_seconds)
        .unwrap_or(default_secs);
    player.remaining_turn_seconds = Some(remaining_seconds);
    player.turn_expires_at = None;
    player.turn_deadline = None;
    let timer = player.turn_timer.take();
    debug!(
        player_id = %player.player_id,
        remaining_seconds,
        "turn clock paused"
    );
    Some(PausedTurn {
        player_id: player.player_id.clone(),
        remaining_seconds,
        timer,
    })
}

/// Seconds until `deadline`, rounded up, clamped at zero.
fn remaining_whole_seconds(deadline: Instant) -> u64 {
    let left = deadline.saturating_duration_since(Instant::now());
    let secs = left.as_secs();
    if left.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[instrument(skip(state), fields(code = %code, player_id = %player_id))]
async fn run_countdown(
    state: Arc<AppState>,
    code: String,
    player_id: PlayerId,
    total: u64,
    expires_at: chrono::DateTime<Utc>,
    version: u64,
    timer_id: u64,
) {
    // The arming critical section may have been superseded before this task
    // first ran (rematch reset, room removal).
    {
        let Some(shared) = state.registry.get(&code) else {
            return;
        };
        let room = lock_room(&shared);
        if room.turn_timer_version != version {
            debug!("turn clock stale before first tick");
            return;
        }
    }

    let now = Utc::now();
    state.broadcaster.send_to_group(
        &code,
        ServerMessage::TurnCountdownResumed {
            player_id: player_id.clone(),
            total_seconds: total,
            expires_at_utc: expires_at,
            server_now: now,
        },
    );
    state.broadcaster.send_to_group(
        &code,
        ServerMessage::TurnCountdownTick {
            player_id: player_id.clone(),
            remaining_seconds: total,
            expires_at_utc: expires_at,
            server_now: now,
        },
    );

    for elapsed in 1..total {
        sleep(Duration::from_secs(1)).await;
        let Some(shared) = state.registry.get(&code) else {
            return;
        };
        {
            let room = lock_room(&shared);
            if room.turn_timer_version != version {
                debug!(elapsed, "turn clock superseded mid-count");
                return;
            }
        }
        state.broadcaster.send_to_group(
            &code,
            ServerMessage::TurnCountdownTick {
                player_id: player_id.clone(),
                remaining_seconds: total - elapsed,
                expires_at_utc: expires_at,
                server_now: Utc::now(),
            },
        );
    }
    if total > 0 {
        sleep(Duration::from_secs(1)).await;
    }

    let Some(shared) = state.registry.get(&code) else {
        debug!("room gone before turn expiry");
        return;
    };
    let payload = {
        let mut room = lock_room(&shared);
        if room.is_game_over {
            debug!("turn clock expired after game end");
            return;
        }
        let Some(mark) = room.current_turn else {
            debug!("turn clock expired with no turn holder");
            return;
        };
        let owner = room.player_with_mark(mark);
        let owns_clock = owner
            .and_then(|p| p.turn_timer.as_ref())
            .map(|t| t.id())
            == Some(timer_id)
            && owner.map(|p| p.player_id.as_str()) == Some(player_id.as_str());
        if !owns_clock {
            debug!("turn clock no longer current at expiry");
            return;
        }
        if let Some(player) = room.player_with_mark_mut(mark) {
            player.turn_timer = None;
            player.turn_expires_at = None;
            player.turn_deadline = None;
        }
        let board = room.board.clone();
        let winner = room
            .opponent_of(&player_id)
            .map(|p| (p.player_id.clone(), p.mark));
        room.forfeit(&player_id);
        room.apply_event(Event::PlayerForfeited);
        warn!(total, "turn timed out; forfeiting");
        let (winner_id, winner_symbol) = match winner {
            Some((id, mark)) => (Some(id), mark),
            None => (None, None),
        };
        GameOverPayload::winner(
            &code,
            winner_id,
            winner_symbol,
            board,
            Some(TURN_TIMEOUT_MESSAGE.to_string()),
        )
    };
    state
        .broadcaster
        .send_to_group(&code, ServerMessage::GameOver(payload));
    handlers::close_room(&state, &code);
}
