//! Wire types: client requests, server pushes, and the RPC envelope.
//!
//! Everything here serializes with camelCase field names and a `type` tag,
//! matching what the browser client speaks.

use crate::engine::{Board, Mark};
use crate::error::ErrorCode;
use crate::room::{PlayerId, StateSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requests a client may send over its socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Create a room and take the first seat.
    CreateGame,
    /// Join an existing room by code.
    #[serde(rename_all = "camelCase")]
    JoinGame {
        /// Target room code.
        code: String,
        /// Prior player id, when the tab believes it already has a seat.
        #[serde(default)]
        client_player_id: Option<String>,
    },
    /// Place a mark.
    #[serde(rename_all = "camelCase")]
    MakeMove {
        /// Target room code.
        code: String,
        /// Board index 0..=8.
        index: usize,
        /// Optional seat assertion; must match the caller's seat when set.
        #[serde(default)]
        player_id: Option<String>,
    },
    /// Resume a disconnected seat.
    #[serde(rename_all = "camelCase")]
    Reconnect {
        /// Target room code.
        code: String,
        /// The seat to resume.
        player_id: String,
    },
    /// Fetch a state snapshot.
    #[serde(rename_all = "camelCase")]
    GetGameState {
        /// Target room code.
        code: String,
        /// The asking seat.
        player_id: String,
    },
    /// Offer a rematch after game over.
    #[serde(rename_all = "camelCase")]
    OfferRematch {
        /// Target room code.
        code: String,
    },
    /// Accept an open rematch offer.
    #[serde(rename_all = "camelCase")]
    AcceptRematch {
        /// Target room code.
        code: String,
    },
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// Somebody won, by line or by forfeit.
    Winner,
    /// Board filled, no line.
    Draw,
    /// The room was closed administratively (idle sweep).
    Cancelled,
}

/// Payload of the `gameOver` push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverPayload {
    /// Room the game belongs to.
    pub room_code: String,
    /// Win, draw, or cancellation.
    pub result: GameResult,
    /// Winning player id, for `Winner` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    /// Winning mark, for `Winner` results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_symbol: Option<Mark>,
    /// Final board, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_snapshot: Option<Board>,
    /// Turn holder at the time of the snapshot, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<Mark>,
    /// Always true; kept so clients can reuse their state-sync path.
    pub is_game_over: bool,
    /// Human-readable cause, when one helps ("Player timed out…").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Correlation id, when the game ended inside an RPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Server wall clock at emission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl GameOverPayload {
    /// A win (by line or forfeit) in `code`.
    pub fn winner(
        code: &str,
        winner_id: Option<PlayerId>,
        winner_symbol: Option<Mark>,
        board: Board,
        message: Option<String>,
    ) -> Self {
        Self {
            room_code: code.to_string(),
            result: GameResult::Winner,
            winner_id,
            winner_symbol,
            board_snapshot: Some(board),
            current_turn: None,
            is_game_over: true,
            message,
            correlation_id: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// A draw in `code`.
    pub fn draw(code: &str, board: Board) -> Self {
        Self {
            room_code: code.to_string(),
            result: GameResult::Draw,
            winner_id: None,
            winner_symbol: None,
            board_snapshot: Some(board),
            current_turn: None,
            is_game_over: true,
            message: None,
            correlation_id: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// An administrative cancellation of `code`.
    pub fn cancelled(code: &str, message: &str) -> Self {
        Self {
            room_code: code.to_string(),
            result: GameResult::Cancelled,
            winner_id: None,
            winner_symbol: None,
            board_snapshot: None,
            current_turn: None,
            is_game_over: true,
            message: Some(message.to_string()),
            correlation_id: None,
            server_timestamp: Some(Utc::now()),
        }
    }
}

/// The uniform RPC response record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    /// Whether the call succeeded.
    pub success: bool,
    /// Operation-specific result, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Failure code, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Fixed message for `error_code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Extra failure context, rarely present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// 32-hex id generated for this call.
    pub correlation_id: String,
    /// Server wall clock when the response was formed.
    pub server_timestamp: DateTime<Utc>,
}

impl RpcResponse {
    /// A success envelope carrying `payload`.
    pub fn ok(correlation_id: String, payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error_code: None,
            error_message: None,
            details: None,
            correlation_id,
            server_timestamp: Utc::now(),
        }
    }

    /// A failure envelope for `code`, with its fixed message.
    pub fn fail(correlation_id: String, code: ErrorCode) -> Self {
        Self {
            success: false,
            payload: None,
            error_code: Some(code),
            error_message: Some(code.message().to_string()),
            details: None,
            correlation_id,
            server_timestamp: Utc::now(),
        }
    }
}

/// Pushes and responses the server writes to sockets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Room created; the caller holds the first seat.
    #[serde(rename_all = "camelCase")]
    GameCreated {
        /// New room code.
        code: String,
        /// Empty board.
        board: Board,
        /// The caller's player id.
        player_id: PlayerId,
    },
    /// The caller joined a room.
    #[serde(rename_all = "camelCase")]
    GameJoined {
        /// Joined room code.
        code: String,
        /// Board at join time.
        board: Board,
        /// The caller's mark, when the game has started.
        symbol: Option<Mark>,
        /// Turn holder, when the game has started.
        current_turn: Option<Mark>,
        /// The caller's player id.
        player_id: PlayerId,
    },
    /// Both seats are filled; play begins.
    #[serde(rename_all = "camelCase")]
    GameStarted {
        /// Starting board.
        board: Board,
        /// Turn holder (always X on a fresh game).
        current_turn: Option<Mark>,
    },
    /// Join refused: the room cannot take the caller.
    #[serde(rename_all = "camelCase")]
    GameFull {
        /// The full room's code.
        code: String,
    },
    /// A second player joined the caller's room.
    PlayerJoined,
    /// A player disconnected and their grace period began.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        /// The disconnected player.
        player_id: PlayerId,
    },
    /// A disconnected player came back.
    #[serde(rename_all = "camelCase")]
    PlayerReconnected {
        /// The returning player.
        player_id: PlayerId,
    },
    /// Full state resync after a reconnect.
    #[serde(rename_all = "camelCase")]
    SyncedState {
        /// Board right now.
        board: Board,
        /// The caller's mark, if assigned.
        symbol: Option<Mark>,
        /// Turn holder, if the game is running.
        current_turn: Option<Mark>,
        /// Whether the game has ended.
        is_game_over: bool,
        /// Winning mark, if any.
        winner: Option<Mark>,
    },
    /// A move was applied.
    #[serde(rename_all = "camelCase")]
    BoardUpdated {
        /// Board after the move.
        board: Board,
        /// Next turn holder, or `None` when the game ended.
        current_turn: Option<Mark>,
        /// Whether the move ended the game.
        is_game_over: bool,
        /// Winning mark, if the move won.
        winner: Option<Mark>,
    },
    /// One second of a reconnection grace period elapsed.
    #[serde(rename_all = "camelCase")]
    CountdownTick {
        /// The player being waited on.
        player_id: PlayerId,
        /// Seconds left before forfeit.
        remaining_seconds: u64,
    },
    /// A turn clock started or resumed.
    #[serde(rename_all = "camelCase")]
    TurnCountdownResumed {
        /// The seat on the clock.
        player_id: PlayerId,
        /// Full seconds on the clock.
        total_seconds: u64,
        /// Absolute deadline.
        expires_at_utc: DateTime<Utc>,
        /// Server wall clock at emission, for client-side skew correction.
        server_now: DateTime<Utc>,
    },
    /// One second of a turn clock elapsed.
    #[serde(rename_all = "camelCase")]
    TurnCountdownTick {
        /// The seat on the clock.
        player_id: PlayerId,
        /// Seconds left on the clock.
        remaining_seconds: u64,
        /// Absolute deadline.
        expires_at_utc: DateTime<Utc>,
        /// Server wall clock at emission.
        server_now: DateTime<Utc>,
    },
    /// A turn clock paused because a player disconnected.
    #[serde(rename_all = "camelCase")]
    TurnCountdownPaused {
        /// The seat whose clock paused.
        player_id: PlayerId,
        /// Seconds preserved for resumption.
        remaining_seconds: u64,
        /// Server wall clock at emission.
        server_now: DateTime<Utc>,
    },
    /// A player offered (or seconded) a rematch.
    #[serde(rename_all = "camelCase")]
    RematchOffered {
        /// The offering player.
        player_id: PlayerId,
        /// End of the current window.
        expires_at: DateTime<Utc>,
    },
    /// A rematch window opened after game over.
    #[serde(rename_all = "camelCase")]
    RematchWindowStarted {
        /// End of the window.
        expires_at: DateTime<Utc>,
    },
    /// The rematch window lapsed; the room is going away.
    #[serde(rename_all = "camelCase")]
    RematchWindowExpired {
        /// The expiring room.
        code: String,
    },
    /// Both players agreed; a fresh game begins on the same code.
    #[serde(rename_all = "camelCase")]
    RematchStarted {
        /// The room hosting the rematch.
        code: String,
    },
    /// A game ended.
    GameOver(GameOverPayload),
    /// The room was removed; drop local state.
    #[serde(rename_all = "camelCase")]
    RoomClosed {
        /// The removed room.
        code: String,
    },
    /// The envelope answering one client request.
    Response(RpcResponse),
}

impl ServerMessage {
    /// Builds a `SyncedState` push from a snapshot.
    pub fn synced(snapshot: &StateSnapshot) -> Self {
        ServerMessage::SyncedState {
            board: snapshot.board.clone(),
            symbol: snapshot.symbol,
            current_turn: snapshot.current_turn,
            is_game_over: snapshot.is_game_over,
            winner: snapshot.winner,
        }
    }
}
