//! Mutable per-room state: the board, the two seats, and the timer handles.
//!
//! Every field here is guarded by the room's mutex; all methods assume the
//! caller holds it. Nothing in this module sleeps or sends.

use crate::broadcast::ConnectionId;
use crate::engine::{self, Board, Mark, MoveOutcome};
use crate::error::ErrorCode;
use crate::room::machine::{self, Event, Phase};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Opaque player identifier (32-hex UUID).
pub type PlayerId = String;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// A cancellable timer owned by a room or player field.
///
/// The id is process-unique; a woken task compares its own id against the
/// stored handle to learn whether it is still the current timer. `cancel`
/// aborts the task at its next suspension point.
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    /// Allocates an id for a timer about to be spawned.
    pub fn next_id() -> u64 {
        NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Pairs a previously allocated id with the spawned task.
    pub fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self { id, handle }
    }

    /// The timer's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Aborts the underlying task.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// One seat in a room.
#[derive(Debug)]
pub struct Player {
    /// Immutable, globally unique id the client holds across reconnects.
    pub player_id: PlayerId,
    /// Live connection, or `None` while disconnected.
    pub connection_id: Option<ConnectionId>,
    /// Assigned at game start, cleared on rematch reset.
    pub mark: Option<Mark>,
    /// One-shot latch: true once a grace period has been started for this
    /// player in the current game.
    pub grace_used: bool,
    /// Running grace countdown, if any.
    pub reconnection_timer: Option<TimerHandle>,
    /// Absolute grace deadline for the wire.
    pub reconnection_expires_at: Option<DateTime<Utc>>,
    /// Running turn countdown, if any.
    pub turn_timer: Option<TimerHandle>,
    /// Absolute turn deadline for the wire.
    pub turn_expires_at: Option<DateTime<Utc>>,
    /// Monotonic turn deadline used for remaining-time arithmetic.
    pub turn_deadline: Option<tokio::time::Instant>,
    /// Seconds preserved when the turn clock was paused; `None` otherwise.
    pub remaining_turn_seconds: Option<u64>,
}

impl Player {
    fn new(player_id: PlayerId, connection_id: ConnectionId) -> Self {
        Self {
            player_id,
            connection_id: Some(connection_id),
            mark: None,
            grace_used: false,
            reconnection_timer: None,
            reconnection_expires_at: None,
            turn_timer: None,
            turn_expires_at: None,
            turn_deadline: None,
            remaining_turn_seconds: None,
        }
    }

    /// True while the player holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.connection_id.is_some()
    }
}

/// Read-only view of a game for one player, shaped for the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Current board.
    pub board: Board,
    /// The viewing player's mark, if assigned.
    pub symbol: Option<Mark>,
    /// Mark holding the turn, if the game is running.
    pub current_turn: Option<Mark>,
    /// Whether the game has ended.
    pub is_game_over: bool,
    /// Winning mark; `None` for draw or not-over.
    pub winner: Option<Mark>,
}

/// A room: board, seats, phase, and timer bookkeeping.
#[derive(Debug)]
pub struct Room {
    /// Immutable short code.
    pub code: String,
    /// Current board.
    pub board: Board,
    /// Seats keyed by player id.
    pub players: HashMap<PlayerId, Player>,
    /// Player ids in join order; never longer than two.
    pub player_order: Vec<PlayerId>,
    /// Mark holding the turn; `None` before start and after game over.
    pub current_turn: Option<Mark>,
    /// Whether the game has ended.
    pub is_game_over: bool,
    /// Winning mark; `None` for draw or not-over.
    pub winner: Option<Mark>,
    /// Players who offered/accepted a rematch in the current window.
    pub rematch_offers: HashSet<PlayerId>,
    /// Absolute end of the rematch window, while one is open.
    pub rematch_expires_at: Option<DateTime<Utc>>,
    /// Running rematch-window timer, if any.
    pub rematch_timer: Option<TimerHandle>,
    /// Creation instant.
    pub created_at: Instant,
    /// Last mutation instant, for idle sweeping.
    pub last_activity_at: Instant,
    /// Bumped on rematch reset and explicit turn-timer cancellation;
    /// in-flight turn timers re-check it before acting.
    pub turn_timer_version: u64,
    /// Lifecycle phase.
    pub phase: Phase,
}

impl Room {
    /// Creates an empty room in `WaitingForPlayers`.
    #[instrument]
    pub fn new(code: String) -> Self {
        debug!(code = %code, "creating room");
        let now = Instant::now();
        Self {
            code,
            board: Board::new(),
            players: HashMap::new(),
            player_order: Vec::new(),
            current_turn: None,
            is_game_over: false,
            winner: None,
            rematch_offers: HashSet::new(),
            rematch_expires_at: None,
            rematch_timer: None,
            created_at: now,
            last_activity_at: now,
            turn_timer_version: 0,
            phase: Phase::WaitingForPlayers,
        }
    }

    /// Records activity for the idle sweeper.
    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Advances the lifecycle phase, logging and ignoring invalid events.
    pub fn apply_event(&mut self, event: Event) -> bool {
        match machine::next(self.phase, event) {
            Ok(next) => {
                debug!(code = %self.code, from = ?self.phase, ?event, to = ?next, "phase transition");
                self.phase = next;
                true
            }
            Err(err) => {
                warn!(code = %self.code, %err, "rejected phase transition");
                false
            }
        }
    }

    /// Whether another player may still join.
    pub fn can_join(&self, max_players: usize) -> bool {
        self.players.len() < max_players
    }

    /// True once symbols have been assigned for the current game.
    pub fn marks_assigned(&self) -> bool {
        self.players.values().any(|p| p.mark.is_some())
    }

    /// True when every seat holds a live connection.
    pub fn all_connected(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(Player::is_connected)
    }

    /// True when no seat holds a live connection.
    pub fn all_disconnected(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| !p.is_connected())
    }

    /// True when some seat is currently disconnected.
    pub fn has_disconnected_player(&self) -> bool {
        self.players.values().any(|p| !p.is_connected())
    }

    /// The seat bound to `connection_id`, if any.
    pub fn player_by_connection(&self, connection_id: &str) -> Option<&Player> {
        self.players
            .values()
            .find(|p| p.connection_id.as_deref() == Some(connection_id))
    }

    /// The seat holding `mark`, if any.
    pub fn player_with_mark(&self, mark: Mark) -> Option<&Player> {
        self.players.values().find(|p| p.mark == Some(mark))
    }

    /// Mutable access to the seat holding `mark`.
    pub fn player_with_mark_mut(&mut self, mark: Mark) -> Option<&mut Player> {
        self.players.values_mut().find(|p| p.mark == Some(mark))
    }

    /// The other seat, relative to `player_id`.
    pub fn opponent_of(&self, player_id: &str) -> Option<&Player> {
        self.player_order
            .iter()
            .find(|id| id.as_str() != player_id)
            .and_then(|id| self.players.get(id))
    }

    /// Seats `player_id` on `connection_id`, creating the seat when the
    /// player is unknown and capacity allows. Idempotent per connection:
    /// repeating the same pair only refreshes activity, and a connection
    /// already bound to a different seat is refused.
    #[instrument(skip(self), fields(code = %self.code))]
    pub fn add_connection(
        &mut self,
        player_id: &str,
        connection_id: &str,
        max_players: usize,
    ) -> bool {
        if let Some(holder) = self.player_by_connection(connection_id) {
            if holder.player_id != player_id {
                warn!(
                    connection_id,
                    holder = %holder.player_id,
                    "connection already occupies another seat"
                );
                return false;
            }
        }
        if let Some(player) = self.players.get_mut(player_id) {
            player.connection_id = Some(connection_id.to_string());
            self.touch();
            return true;
        }
        if self.players.len() >= max_players {
            debug!(player_id, "room at capacity");
            return false;
        }
        self.players.insert(
            player_id.to_string(),
            Player::new(player_id.to_string(), connection_id.to_string()),
        );
        self.player_order.push(player_id.to_string());
        self.touch();
        true
    }

    /// Detaches whichever seat holds `connection_id`, returning its player id.
    #[instrument(skip(self), fields(code = %self.code))]
    pub fn remove_connection(&mut self, connection_id: &str) -> Option<PlayerId> {
        let player = self
            .players
            .values_mut()
            .find(|p| p.connection_id.as_deref() == Some(connection_id))?;
        player.connection_id = None;
        let player_id = player.player_id.clone();
        self.touch();
        Some(player_id)
    }

    /// Starts the game once both seats are filled and unmarked: assigns
    /// symbols, gives X the turn, and moves the phase to `Active`.
    #[instrument(skip(self, rng), fields(code = %self.code))]
    pub fn try_start_game<R: Rng>(&mut self, rng: &mut R) -> bool {
        if self.player_order.len() != 2 || self.marks_assigned() {
            return false;
        }
        let (first, second) = engine::assign_marks(rng);
        let order = self.player_order.clone();
        if let Some(p) = self.players.get_mut(&order[0]) {
            p.mark = Some(first);
        }
        if let Some(p) = self.players.get_mut(&order[1]) {
            p.mark = Some(second);
        }
        self.current_turn = Some(Mark::X);
        self.apply_event(Event::PlayerJoined);
        self.touch();
        debug!(first = %first, second = %second, "game started");
        true
    }

    /// Applies a move for the seat bound to `connection_id`.
    ///
    /// Gates fail in a fixed order: finished game, unseated caller,
    /// disconnected opponent, wrong turn, then the engine's own checks.
    #[instrument(skip(self), fields(code = %self.code))]
    pub fn try_make_move(
        &mut self,
        connection_id: &str,
        index: usize,
    ) -> Result<MoveOutcome, ErrorCode> {
        if self.is_game_over {
            return Err(ErrorCode::GameOver);
        }
        let mark = match self.player_by_connection(connection_id) {
            Some(player) => match player.mark {
                Some(mark) => mark,
                None => return Err(ErrorCode::NotInGame),
            },
            None => return Err(ErrorCode::NotInGame),
        };
        if !self.all_connected() {
            return Err(ErrorCode::OpponentDisconnected);
        }
        if self.current_turn != Some(mark) {
            return Err(ErrorCode::NotYourTurn);
        }
        match engine::apply_move(&mut self.board, mark, index) {
            MoveOutcome::InvalidIndex => Err(ErrorCode::InvalidIndex),
            MoveOutcome::CellTaken => Err(ErrorCode::CellTaken),
            outcome @ MoveOutcome::Win(_) => {
                self.is_game_over = true;
                self.winner = Some(mark);
                self.current_turn = None;
                self.touch();
                Ok(outcome)
            }
            MoveOutcome::Draw => {
                self.is_game_over = true;
                self.winner = None;
                self.current_turn = None;
                self.touch();
                Ok(MoveOutcome::Draw)
            }
            outcome @ MoveOutcome::Continue(next) => {
                self.current_turn = Some(next);
                self.touch();
                Ok(outcome)
            }
        }
    }

    /// Ends the game with `player_id`'s opponent as winner.
    #[instrument(skip(self), fields(code = %self.code))]
    pub fn forfeit(&mut self, player_id: &str) {
        self.winner = self.opponent_of(player_id).and_then(|p| p.mark);
        self.is_game_over = true;
        self.current_turn = None;
        self.touch();
    }

    /// Cancels every running turn timer and bumps the timer version so a
    /// timer already past its sleep cannot act on the room.
    pub fn cancel_turn_timers(&mut self) {
        for player in self.players.values_mut() {
            if let Some(timer) = player.turn_timer.take() {
                debug!(code = %self.code, player_id = %player.player_id, timer_id = timer.id(), "cancelling turn timer");
                timer.cancel();
            }
            player.turn_expires_at = None;
            player.turn_deadline = None;
        }
        self.turn_timer_version += 1;
    }

    /// Cancels every outstanding timer in the room. Called before removal.
    pub fn cancel_all_timers(&mut self) {
        self.cancel_turn_timers();
        for player in self.players.values_mut() {
            if let Some(timer) = player.reconnection_timer.take() {
                timer.cancel();
            }
            player.reconnection_expires_at = None;
            player.remaining_turn_seconds = None;
        }
        if let Some(timer) = self.rematch_timer.take() {
            timer.cancel();
        }
    }

    /// Wipes the finished game and deals a fresh one on the same code:
    /// empty board, new symbols, X to move, grace latches reset.
    #[instrument(skip(self, rng), fields(code = %self.code))]
    pub fn reset_for_rematch<R: Rng>(&mut self, rng: &mut R) {
        self.cancel_turn_timers();
        for player in self.players.values_mut() {
            if let Some(timer) = player.reconnection_timer.take() {
                timer.cancel();
            }
            player.reconnection_expires_at = None;
            player.remaining_turn_seconds = None;
            player.grace_used = false;
            player.mark = None;
        }
        if let Some(timer) = self.rematch_timer.take() {
            timer.cancel();
        }
        self.board = Board::new();
        self.is_game_over = false;
        self.winner = None;
        self.rematch_offers.clear();
        self.rematch_expires_at = None;

        let (first, second) = engine::assign_marks(rng);
        let order = self.player_order.clone();
        if let Some(p) = order.first().and_then(|id| self.players.get_mut(id)) {
            p.mark = Some(first);
        }
        if let Some(p) = order.get(1).and_then(|id| self.players.get_mut(id)) {
            p.mark = Some(second);
        }
        self.current_turn = Some(Mark::X);
        self.touch();
    }

    /// Sweep predicate: a room is idle when it never really started and has
    /// seen no activity past `idle_timeout`, or when every seat is dead.
    pub fn is_idle_for_cleanup(&self, idle_timeout: Duration) -> bool {
        let never_started = !self.marks_assigned() && self.player_order.len() < 2;
        (never_started && self.last_activity_at.elapsed() > idle_timeout)
            || self.all_disconnected()
    }

    /// Snapshot of the game from `player_id`'s perspective.
    pub fn state_for(&self, player_id: Option<&str>) -> StateSnapshot {
        let symbol = player_id
            .and_then(|id| self.players.get(id))
            .and_then(|p| p.mark);
        StateSnapshot {
            board: self.board.clone(),
            symbol,
            current_turn: self.current_turn,
            is_game_over: self.is_game_over,
            winner: self.winner,
        }
    }
}
