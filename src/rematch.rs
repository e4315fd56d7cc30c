//! Rematch negotiation: the post-game window, the offer set, and the reset.

use crate::error::ErrorCode;
use crate::handlers;
use crate::messages::ServerMessage;
use crate::registry::lock_room;
use crate::room::{Event, Phase, Room, TimerHandle};
use crate::server::AppState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument};

/// Opens the rematch window after a game ends and announces it.
#[instrument(skip(state))]
pub fn start_window(state: &Arc<AppState>, code: &str) {
    let Some(shared) = state.registry.get(code) else {
        return;
    };
    let expires_at = {
        let mut room = lock_room(&shared);
        if !room.is_game_over {
            debug!(code, "rematch window refused: game still running");
            return;
        }
        arm_window(state, code, &mut room)
    };
    state
        .broadcaster
        .send_to_group(code, ServerMessage::RematchWindowStarted { expires_at });
}

/// Records a rematch offer from the seat on `connection_id`.
///
/// Requires a finished game. A dead window (never opened, or already
/// consumed by the expiry task) is re-armed; a live one keeps its deadline,
/// the offerer is only added to the set.
#[instrument(skip(state))]
pub fn offer(state: &Arc<AppState>, code: &str, connection_id: &str) -> Result<DateTime<Utc>, ErrorCode> {
    let Some(shared) = state.registry.get(code) else {
        return Err(ErrorCode::NotFound);
    };
    let (player_id, expires_at) = {
        let mut room = lock_room(&shared);
        let Some(player) = room.player_by_connection(connection_id) else {
            return Err(ErrorCode::OfferFailed);
        };
        let player_id = player.player_id.clone();
        if !room.is_game_over {
            return Err(ErrorCode::OfferFailed);
        }
        let expires_at = match room.rematch_expires_at {
            Some(expires_at) if room.rematch_timer.is_some() => expires_at,
            _ => arm_window(state, code, &mut room),
        };
        room.rematch_offers.insert(player_id.clone());
        if room.phase == Phase::GameOver {
            room.apply_event(Event::RematchOffered);
        }
        room.touch();
        (player_id, expires_at)
    };
    info!(code, player_id = %player_id, "rematch offered");
    state.broadcaster.send_to_group(
        code,
        ServerMessage::RematchOffered {
            player_id,
            expires_at,
        },
    );
    Ok(expires_at)
}

/// Records an acceptance; when every seat has opted in, resets the room for
/// a fresh game and starts the new turn clock.
#[instrument(skip(state))]
pub fn accept(state: &Arc<AppState>, code: &str, connection_id: &str) -> Result<bool, ErrorCode> {
    let Some(shared) = state.registry.get(code) else {
        return Err(ErrorCode::NotFound);
    };
    let started = {
        let mut room = lock_room(&shared);
        let Some(player) = room.player_by_connection(connection_id) else {
            return Err(ErrorCode::AcceptFailed);
        };
        let player_id = player.player_id.clone();
        if room.phase != Phase::RematchOffered
            || room.rematch_expires_at.is_none()
            || room.rematch_timer.is_none()
        {
            return Err(ErrorCode::AcceptFailed);
        }
        room.rematch_offers.insert(player_id);
        if room.rematch_offers.len() >= room.players.len() {
            room.apply_event(Event::RematchAccepted);
            let mut rng = state.lock_rng();
            room.reset_for_rematch(&mut *rng);
            Some((room.board.clone(), room.current_turn))
        } else {
            None
        }
    };

    match started {
        Some((board, current_turn)) => {
            info!(code, "rematch starting");
            state.broadcaster.send_to_group(
                code,
                ServerMessage::RematchStarted {
                    code: code.to_string(),
                },
            );
            state
                .broadcaster
                .send_to_group(code, ServerMessage::GameStarted { board, current_turn });
            crate::timers::turn::start_turn_timeout(state, code);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Sets the deadline and spawns the expiry task, replacing any prior one.
/// Called under the room lock.
fn arm_window(state: &Arc<AppState>, code: &str, room: &mut Room) -> DateTime<Utc> {
    let window_secs = *state.settings.rematch_window_seconds();
    let expires_at = Utc::now() + chrono::Duration::seconds(window_secs as i64);
    room.rematch_expires_at = Some(expires_at);
    if let Some(old) = room.rematch_timer.take() {
        debug!(code, "replacing rematch window timer");
        old.cancel();
    }
    let timer_id = TimerHandle::next_id();
    let task = tokio::spawn(run_window(
        Arc::clone(state),
        code.to_string(),
        window_secs,
        timer_id,
    ));
    room.rematch_timer = Some(TimerHandle::new(timer_id, task));
    expires_at
}

#[instrument(skip(state), fields(code = %code))]
async fn run_window(state: Arc<AppState>, code: String, window_secs: u64, timer_id: u64) {
    sleep(Duration::from_secs(window_secs)).await;

    let Some(shared) = state.registry.get(&code) else {
        return;
    };
    let expired = {
        let mut room = lock_room(&shared);
        let ours = room.rematch_timer.as_ref().map(|t| t.id()) == Some(timer_id);
        if ours && room.rematch_expires_at.is_some() {
            room.rematch_timer = None;
            room.rematch_expires_at = None;
            room.apply_event(Event::RematchExpired);
            true
        } else {
            debug!("rematch window superseded");
            false
        }
    };
    if expired {
        info!("rematch window expired");
        state.broadcaster.send_to_group(
            &code,
            ServerMessage::RematchWindowExpired { code: code.clone() },
        );
        handlers::close_room(&state, &code);
    }
}
