//! Reconnection grace periods.
//!
//! The first disconnect in a game buys a player one grace window; the room
//! freezes (moves are refused, the turn clock pauses elsewhere) while the
//! countdown runs. Returning in time cancels it. Running it out, or
//! disconnecting a second time in the same game, forfeits.

use crate::handlers;
use crate::messages::{GameOverPayload, ServerMessage};
use crate::registry::lock_room;
use crate::room::{Event, PlayerId, TimerHandle};
use crate::server::AppState;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, warn};

/// Push sent when a grace period runs out.
pub const GRACE_FORFEIT_MESSAGE: &str = "Opponent disconnected and failed to reconnect";

/// Begins (or short-circuits) the grace protocol for a disconnected player.
///
/// First disconnect of the game: latches `grace_used`, arms the countdown,
/// and returns. Any later disconnect finds the latch set and forfeits
/// immediately, without ticks. No-op when the player is unknown or already
/// back.
#[instrument(skip(state))]
pub fn start_grace_period(state: &Arc<AppState>, code: &str, player_id: &str) {
    let Some(shared) = state.registry.get(code) else {
        debug!(code, "grace period not started: room gone");
        return;
    };
    let grace_secs = *state.settings.reconnection_grace_period_seconds();

    let immediate = {
        let mut room = lock_room(&shared);
        let Some(player) = room.players.get_mut(player_id) else {
            debug!(code, player_id, "grace period not started: unknown player");
            return;
        };
        if player.is_connected() {
            debug!(code, player_id, "grace period not started: already reconnected");
            return;
        }
        if player.grace_used {
            true
        } else {
            player.grace_used = true;
            player.reconnection_expires_at =
                Some(Utc::now() + chrono::Duration::seconds(grace_secs as i64));
            let timer_id = TimerHandle::next_id();
            debug!(code, player_id, grace_secs, timer_id, "grace countdown armed");
            let task = tokio::spawn(run_countdown(
                Arc::clone(state),
                code.to_string(),
                player_id.to_string(),
                grace_secs,
                timer_id,
            ));
            player.reconnection_timer = Some(TimerHandle::new(timer_id, task));
            false
        }
    };

    if immediate {
        warn!(code, player_id, "grace already consumed; forfeiting immediately");
        forfeit_and_close(state, code, player_id);
    }
}

/// Forfeits `player_id` under the lock (re-verifying they are still gone),
/// then announces the result and removes the room. Shared by the
/// immediate-forfeit path and countdown expiry.
fn forfeit_and_close(state: &Arc<AppState>, code: &str, player_id: &str) {
    let Some(shared) = state.registry.get(code) else {
        return;
    };
    let payload = {
        let mut room = lock_room(&shared);
        let Some(player) = room.players.get(player_id) else {
            return;
        };
        if player.is_connected() || !player.grace_used {
            debug!(code, player_id, "forfeit aborted: player state changed");
            return;
        }
        let board = room.board.clone();
        let winner = room
            .opponent_of(player_id)
            .map(|p| (p.player_id.clone(), p.mark));
        room.forfeit(player_id);
        room.apply_event(Event::PlayerForfeited);
        let (winner_id, winner_symbol) = match winner {
            Some((id, mark)) => (Some(id), mark),
            None => (None, None),
        };
        GameOverPayload::winner(
            code,
            winner_id,
            winner_symbol,
            board,
            Some(GRACE_FORFEIT_MESSAGE.to_string()),
        )
    };
    state
        .broadcaster
        .send_to_group(code, ServerMessage::GameOver(payload));
    handlers::close_room(state, code);
}

#[instrument(skip(state), fields(code = %code, player_id = %player_id))]
async fn run_countdown(
    state: Arc<AppState>,
    code: String,
    player_id: PlayerId,
    total: u64,
    timer_id: u64,
) {
    state.broadcaster.send_to_group(
        &code,
        ServerMessage::PlayerLeft {
            player_id: player_id.clone(),
        },
    );

    let mut remaining = total;
    loop {
        state.broadcaster.send_to_group(
            &code,
            ServerMessage::CountdownTick {
                player_id: player_id.clone(),
                remaining_seconds: remaining,
            },
        );
        if remaining == 0 {
            break;
        }
        sleep(Duration::from_secs(1)).await;
        remaining -= 1;
    }

    let Some(shared) = state.registry.get(&code) else {
        debug!("room gone before grace expiry");
        return;
    };
    let expire = {
        let mut room = lock_room(&shared);
        let (still_gone, ours, has_timer) = match room.players.get(&player_id) {
            Some(player) => (
                !player.is_connected() && player.grace_used,
                player.reconnection_timer.as_ref().map(|t| t.id()) == Some(timer_id),
                player.reconnection_timer.is_some(),
            ),
            None => return,
        };
        if still_gone && ours {
            if let Some(player) = room.players.get_mut(&player_id) {
                player.reconnection_timer = None;
                player.reconnection_expires_at = None;
            }
            true
        } else if still_gone
            && !has_timer
            && room.last_activity_at.elapsed() > Duration::from_secs(total + 1)
        {
            // Safety net: the primary handle was lost but nobody acted and
            // the room has sat past the whole window.
            warn!(reason = "fallback", "forcing forfeit after lost grace timer");
            true
        } else {
            debug!(still_gone, ours, "grace countdown superseded; exiting");
            false
        }
    };

    if expire {
        forfeit_and_close(&state, &code, &player_id);
    }
}
