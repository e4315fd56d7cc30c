//! Request handlers: the glue between socket frames and the room runtime.
//!
//! Each handler validates input, takes the room lock briefly, mutates
//! through the room's own methods, and broadcasts from snapshots captured
//! under the lock. Every call is answered with exactly one envelope.

use crate::engine::{Board, Mark, MoveOutcome};
use crate::error::ErrorCode;
use crate::messages::{ClientMessage, GameOverPayload, RpcResponse, ServerMessage};
use crate::registry::lock_room;
use crate::rematch;
use crate::room::{Event, Phase, PlayerId, Room, StateSnapshot};
use crate::server::AppState;
use crate::timers::{reconnect as grace, turn};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Parses one inbound frame, runs the matching handler, and answers with
/// the envelope. Unparseable frames get a plain `Invalid` failure.
pub fn dispatch(state: &Arc<AppState>, connection_id: &str, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(connection_id, %err, "unparseable client message");
            let response = RpcResponse::fail(new_hex_id(), ErrorCode::Invalid);
            state
                .broadcaster
                .send_to(connection_id, ServerMessage::Response(response));
            return;
        }
    };

    let response = match message {
        ClientMessage::CreateGame => create_game(state, connection_id),
        ClientMessage::JoinGame {
            code,
            client_player_id,
        } => join_game(state, connection_id, &code, client_player_id.as_deref()),
        ClientMessage::MakeMove {
            code,
            index,
            player_id,
        } => make_move(state, connection_id, &code, index, player_id.as_deref()),
        ClientMessage::Reconnect { code, player_id } => {
            reconnect(state, connection_id, &code, &player_id)
        }
        ClientMessage::GetGameState { code, player_id } => {
            get_game_state(state, &code, &player_id)
        }
        ClientMessage::OfferRematch { code } => offer_rematch(state, connection_id, &code),
        ClientMessage::AcceptRematch { code } => accept_rematch(state, connection_id, &code),
    };
    state
        .broadcaster
        .send_to(connection_id, ServerMessage::Response(response));
}

/// Creates a room, seats the caller, and subscribes them to its group.
#[instrument(skip(state))]
pub fn create_game(state: &Arc<AppState>, connection_id: &str) -> RpcResponse {
    let correlation_id = new_hex_id();
    let player_id = new_hex_id();

    let shared = loop {
        let code = {
            let mut rng = state.lock_rng();
            state.codes.generate(&mut *rng)
        };
        match state.registry.insert(Room::new(code)) {
            Ok(shared) => break shared,
            Err(err) => warn!(%err, "room code collision; drawing another"),
        }
    };
    let (code, board) = {
        let mut room = lock_room(&shared);
        room.add_connection(
            &player_id,
            connection_id,
            *state.settings.max_players_per_room(),
        );
        (room.code.clone(), room.board.clone())
    };

    state.broadcaster.add_to_group(connection_id, &code);
    state.broadcaster.send_to(
        connection_id,
        ServerMessage::GameCreated {
            code: code.clone(),
            board: board.clone(),
            player_id: player_id.clone(),
        },
    );
    info!(code = %code, player_id = %player_id, "game created");
    RpcResponse::ok(
        correlation_id,
        json!({ "code": code, "board": board, "playerId": player_id }),
    )
}

enum JoinOutcome {
    Fail(ErrorCode),
    Full,
    AlreadyPlaying(StateSnapshot),
    Seated {
        player_id: PlayerId,
        symbol: Option<Mark>,
        board: Board,
        current_turn: Option<Mark>,
        started: bool,
    },
}

/// Seats the caller in an existing room, starting the game when it fills.
#[instrument(skip(state))]
pub fn join_game(
    state: &Arc<AppState>,
    connection_id: &str,
    code: &str,
    client_player_id: Option<&str>,
) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    if let Some(pid) = client_player_id {
        if !player_id_is_valid(pid) {
            return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
        }
    }
    let Some(shared) = state.registry.get(&code) else {
        return RpcResponse::fail(correlation_id, ErrorCode::NotFound);
    };

    let outcome = {
        let mut room = lock_room(&shared);
        let max_players = *state.settings.max_players_per_room();
        let claimed_connection = client_player_id
            .and_then(|pid| room.players.get(pid))
            .map(|p| p.connection_id.clone());

        if let Some(existing) = claimed_connection {
            // The caller claims a seat that exists; work out whose it is.
            match existing {
                Some(conn) if conn == connection_id => JoinOutcome::Fail(ErrorCode::AlreadyInRoom),
                Some(_) => JoinOutcome::Fail(ErrorCode::PlayerIdInUse),
                None => JoinOutcome::Fail(ErrorCode::ReconnectRequired),
            }
        } else if let Some(seated) = room
            .player_by_connection(connection_id)
            .map(|p| p.player_id.clone())
        {
            if room.marks_assigned() {
                JoinOutcome::AlreadyPlaying(room.state_for(Some(&seated)))
            } else {
                JoinOutcome::Fail(ErrorCode::AlreadyInRoom)
            }
        } else if room.has_disconnected_player() || !room.can_join(max_players) {
            JoinOutcome::Full
        } else {
            let player_id = new_hex_id();
            room.add_connection(&player_id, connection_id, max_players);
            let started = if room.player_order.len() == 2 && !room.marks_assigned() {
                let mut rng = state.lock_rng();
                room.try_start_game(&mut *rng)
            } else {
                false
            };
            let symbol = room.players.get(&player_id).and_then(|p| p.mark);
            JoinOutcome::Seated {
                player_id,
                symbol,
                board: room.board.clone(),
                current_turn: room.current_turn,
                started,
            }
        }
    };

    match outcome {
        JoinOutcome::Fail(error) => RpcResponse::fail(correlation_id, error),
        JoinOutcome::Full => {
            debug!(code = %code, "join refused: room full or holding a seat open");
            state
                .broadcaster
                .send_to(connection_id, ServerMessage::GameFull { code: code.clone() });
            RpcResponse::fail(correlation_id, ErrorCode::RoomFull)
        }
        JoinOutcome::AlreadyPlaying(snapshot) => {
            state.broadcaster.add_to_group(connection_id, &code);
            RpcResponse::ok(correlation_id, state_payload(&snapshot))
        }
        JoinOutcome::Seated {
            player_id,
            symbol,
            board,
            current_turn,
            started,
        } => {
            state.broadcaster.add_to_group(connection_id, &code);
            state.broadcaster.send_to(
                connection_id,
                ServerMessage::GameJoined {
                    code: code.clone(),
                    board: board.clone(),
                    symbol,
                    current_turn,
                    player_id: player_id.clone(),
                },
            );
            state.broadcaster.send_to_group_except(
                &code,
                connection_id,
                ServerMessage::PlayerJoined,
            );
            if started {
                state.broadcaster.send_to_group(
                    &code,
                    ServerMessage::GameStarted {
                        board: board.clone(),
                        current_turn,
                    },
                );
                turn::start_turn_timeout(state, &code);
            }
            info!(code = %code, player_id = %player_id, started, "player joined");
            RpcResponse::ok(
                correlation_id,
                json!({
                    "code": code,
                    "board": board,
                    "symbol": symbol,
                    "currentTurn": current_turn,
                    "playerId": player_id,
                }),
            )
        }
    }
}

struct ResumedSeat {
    snapshot: StateSnapshot,
    board: Board,
    current_turn: Option<Mark>,
    started: bool,
    resume_clock: bool,
}

/// Rebinds a disconnected seat to the caller's connection and resyncs them.
#[instrument(skip(state))]
pub fn reconnect(
    state: &Arc<AppState>,
    connection_id: &str,
    code: &str,
    player_id: &str,
) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) || !player_id_is_valid(player_id) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    let Some(shared) = state.registry.get(&code) else {
        return RpcResponse::fail(correlation_id, ErrorCode::NotFound);
    };

    let resumed = {
        let mut room = lock_room(&shared);
        let holder = match room.players.get(player_id) {
            Some(player) => player.connection_id.clone(),
            None => {
                debug!(code = %code, player_id, "reconnect refused: unknown player");
                return RpcResponse::fail(correlation_id, ErrorCode::ReconnectFailed);
            }
        };
        if let Some(ref other) = holder {
            if other != connection_id && state.broadcaster.is_connected(other) {
                debug!(code = %code, player_id, "reconnect refused: seat held by live connection");
                return RpcResponse::fail(correlation_id, ErrorCode::ReconnectFailed);
            }
        }

        if let Some(player) = room.players.get_mut(player_id) {
            player.connection_id = Some(connection_id.to_string());
            if let Some(timer) = player.reconnection_timer.take() {
                debug!(code = %code, player_id, cause = "reconnect", "grace countdown cancelled");
                timer.cancel();
            }
            player.reconnection_expires_at = None;
        }
        room.touch();

        let started = if !room.marks_assigned()
            && room.player_order.len() == 2
            && room.all_connected()
        {
            let mut rng = state.lock_rng();
            room.try_start_game(&mut *rng)
        } else {
            false
        };
        let resume_clock = room.marks_assigned() && !room.is_game_over && room.all_connected();
        ResumedSeat {
            snapshot: room.state_for(Some(player_id)),
            board: room.board.clone(),
            current_turn: room.current_turn,
            started,
            resume_clock,
        }
    };

    state.broadcaster.add_to_group(connection_id, &code);
    state
        .broadcaster
        .send_to(connection_id, ServerMessage::synced(&resumed.snapshot));
    state.broadcaster.send_to_group(
        &code,
        ServerMessage::PlayerReconnected {
            player_id: player_id.to_string(),
        },
    );
    if resumed.started {
        state.broadcaster.send_to_group(
            &code,
            ServerMessage::GameStarted {
                board: resumed.board,
                current_turn: resumed.current_turn,
            },
        );
    }
    if resumed.started || resumed.resume_clock {
        turn::start_turn_timeout(state, &code);
    }
    info!(
        code = %code,
        player_id,
        started = resumed.started,
        resume_clock = resumed.resume_clock,
        "player reconnected"
    );
    RpcResponse::ok(correlation_id, state_payload(&resumed.snapshot))
}

/// Returns the caller's view of the game.
#[instrument(skip(state))]
pub fn get_game_state(state: &Arc<AppState>, code: &str, player_id: &str) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) || !player_id_is_valid(player_id) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    let Some(shared) = state.registry.get(&code) else {
        return RpcResponse::fail(correlation_id, ErrorCode::NotFound);
    };
    let room = lock_room(&shared);
    if !room.players.contains_key(player_id) {
        return RpcResponse::fail(correlation_id, ErrorCode::NotInGame);
    }
    let snapshot = room.state_for(Some(player_id));
    RpcResponse::ok(correlation_id, state_payload(&snapshot))
}

enum MoveOutcomeMsg {
    Fail(ErrorCode),
    Moved {
        board: Board,
        current_turn: Option<Mark>,
        winner: Option<Mark>,
        over: Option<GameOverPayload>,
    },
}

/// Applies a move for the caller and fans out the results.
#[instrument(skip(state))]
pub fn make_move(
    state: &Arc<AppState>,
    connection_id: &str,
    code: &str,
    index: usize,
    player_id: Option<&str>,
) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    if index >= *state.settings.board_size() {
        return RpcResponse::fail(correlation_id, ErrorCode::InvalidIndex);
    }
    if let Some(pid) = player_id {
        if !player_id_is_valid(pid) {
            return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
        }
    }
    let Some(shared) = state.registry.get(&code) else {
        return RpcResponse::fail(correlation_id, ErrorCode::NotFound);
    };

    let outcome = {
        let mut room = lock_room(&shared);
        // When the client asserts a seat, it must be the one its connection holds.
        if let Some(pid) = player_id {
            let owns_seat = room
                .player_by_connection(connection_id)
                .map(|p| p.player_id == pid)
                .unwrap_or(false);
            if !owns_seat {
                return RpcResponse::fail(correlation_id, ErrorCode::NotInGame);
            }
        }
        let was_rematch_accepted = room.phase == Phase::RematchAccepted;
        let mover = room
            .player_by_connection(connection_id)
            .map(|p| (p.player_id.clone(), p.mark));
        match room.try_make_move(connection_id, index) {
            Err(error) => MoveOutcomeMsg::Fail(error),
            Ok(result) => {
                if was_rematch_accepted {
                    room.apply_event(Event::FirstMoveMade);
                }
                match result {
                    MoveOutcome::Continue(_) => {
                        if !was_rematch_accepted {
                            room.apply_event(Event::MoveMade);
                        }
                        MoveOutcomeMsg::Moved {
                            board: room.board.clone(),
                            current_turn: room.current_turn,
                            winner: None,
                            over: None,
                        }
                    }
                    MoveOutcome::Win(mark) => {
                        room.apply_event(Event::GameWon);
                        room.cancel_turn_timers();
                        let (winner_id, winner_symbol) = match mover {
                            Some((id, _)) => (Some(id), Some(mark)),
                            None => (None, Some(mark)),
                        };
                        let mut payload = GameOverPayload::winner(
                            &code,
                            winner_id,
                            winner_symbol,
                            room.board.clone(),
                            None,
                        );
                        payload.correlation_id = Some(correlation_id.clone());
                        MoveOutcomeMsg::Moved {
                            board: room.board.clone(),
                            current_turn: None,
                            winner: Some(mark),
                            over: Some(payload),
                        }
                    }
                    MoveOutcome::Draw => {
                        room.apply_event(Event::GameDrawn);
                        room.cancel_turn_timers();
                        let mut payload = GameOverPayload::draw(&code, room.board.clone());
                        payload.correlation_id = Some(correlation_id.clone());
                        MoveOutcomeMsg::Moved {
                            board: room.board.clone(),
                            current_turn: None,
                            winner: None,
                            over: Some(payload),
                        }
                    }
                    // InvalidIndex and CellTaken arrive as Err above.
                    other => {
                        warn!(?other, "unexpected engine outcome");
                        MoveOutcomeMsg::Fail(ErrorCode::Invalid)
                    }
                }
            }
        }
    };

    match outcome {
        MoveOutcomeMsg::Fail(error) => RpcResponse::fail(correlation_id, error),
        MoveOutcomeMsg::Moved {
            board,
            current_turn,
            winner,
            over,
        } => {
            state.broadcaster.send_to_group(
                &code,
                ServerMessage::BoardUpdated {
                    board: board.clone(),
                    current_turn,
                    is_game_over: over.is_some(),
                    winner,
                },
            );
            let is_game_over = over.is_some();
            if let Some(payload) = over {
                state
                    .broadcaster
                    .send_to_group(&code, ServerMessage::GameOver(payload));
                rematch::start_window(state, &code);
            } else {
                turn::start_turn_timeout(state, &code);
            }
            RpcResponse::ok(
                correlation_id,
                json!({
                    "board": board,
                    "currentTurn": current_turn,
                    "isGameOver": is_game_over,
                    "winner": winner,
                }),
            )
        }
    }
}

/// Offers a rematch on a finished game.
#[instrument(skip(state))]
pub fn offer_rematch(state: &Arc<AppState>, connection_id: &str, code: &str) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    match rematch::offer(state, &code, connection_id) {
        Ok(expires_at) => RpcResponse::ok(correlation_id, json!({ "expiresAt": expires_at })),
        Err(error) => RpcResponse::fail(correlation_id, error),
    }
}

/// Accepts an open rematch offer.
#[instrument(skip(state))]
pub fn accept_rematch(state: &Arc<AppState>, connection_id: &str, code: &str) -> RpcResponse {
    let correlation_id = new_hex_id();
    let code = normalize_code(code);
    if !code_is_valid(&code) {
        return RpcResponse::fail(correlation_id, ErrorCode::Invalid);
    }
    match rematch::accept(state, &code, connection_id) {
        Ok(started) => RpcResponse::ok(correlation_id, json!({ "started": started })),
        Err(error) => RpcResponse::fail(correlation_id, error),
    }
}

/// Disconnect hook: runs for every room holding this connection.
///
/// Best-effort across rooms; each room decides independently whether to
/// close now (rematch window open, or nobody left) or to freeze and grant
/// the leaver a grace period.
#[instrument(skip(state))]
pub fn handle_disconnect(state: &Arc<AppState>, connection_id: &str) {
    for code in state.registry.all_codes() {
        let Some(shared) = state.registry.get(&code) else {
            continue;
        };
        let mut schedule_close = false;
        let mut paused = None;
        let mut grace_player: Option<PlayerId> = None;
        {
            let mut room = lock_room(&shared);
            if room.player_by_connection(connection_id).is_none() {
                continue;
            }
            if room.is_game_over && room.rematch_expires_at.is_some() {
                // No grace in the post-game window.
                schedule_close = true;
            } else if !room.is_game_over && room.marks_assigned() {
                paused = turn::pause_turn_timer(&mut room, *state.settings.turn_timeout_seconds());
            }
            let player_id = room.remove_connection(connection_id);
            if room.phase == Phase::Active {
                room.apply_event(Event::PlayerDisconnected);
            }
            if room.all_disconnected() {
                schedule_close = true;
            }
            if !schedule_close {
                grace_player = player_id;
            }
        }

        if let Some(pause) = paused {
            if let Some(timer) = pause.timer {
                timer.cancel();
            }
            state.broadcaster.send_to_group(
                &code,
                ServerMessage::TurnCountdownPaused {
                    player_id: pause.player_id,
                    remaining_seconds: pause.remaining_seconds,
                    server_now: Utc::now(),
                },
            );
        }
        if schedule_close {
            info!(code = %code, "closing room after disconnect");
            close_room(state, &code);
        } else if let Some(player_id) = grace_player {
            grace::start_grace_period(state, &code, &player_id);
        }
    }
}

/// Removes a room: cancels every outstanding timer, tells the group, and
/// drops the group. Callers emit their own `GameOver` first when one is due.
#[instrument(skip(state))]
pub fn close_room(state: &Arc<AppState>, code: &str) {
    let Some(shared) = state.registry.remove(code) else {
        return;
    };
    {
        let mut room = lock_room(&shared);
        room.apply_event(Event::RoomClosed);
        room.cancel_all_timers();
    }
    state.broadcaster.send_to_group(
        code,
        ServerMessage::RoomClosed {
            code: code.to_string(),
        },
    );
    state.broadcaster.remove_group(code);
    info!(code, "room closed");
}

fn state_payload(snapshot: &StateSnapshot) -> serde_json::Value {
    serde_json::to_value(snapshot).unwrap_or_else(|err| {
        warn!(%err, "state snapshot failed to serialize");
        serde_json::Value::Null
    })
}

fn new_hex_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn code_is_valid(code: &str) -> bool {
    (4..=6).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn player_id_is_valid(player_id: &str) -> bool {
    Uuid::parse_str(player_id).is_ok()
}
