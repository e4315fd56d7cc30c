//! Real-time two-player tic-tac-toe room service.
//!
//! Clients hold one WebSocket per browser tab, create or join a short-code
//! room, and play alternating moves. The interesting machinery is the room
//! runtime:
//!
//! - **Rooms**: per-room state behind a short-lived mutex, advanced by a
//!   lifecycle state machine ([`room`])
//! - **Timers**: cooperative countdowns for reconnection grace and the
//!   per-turn clock, cancellable and version-checked ([`timers`])
//! - **Registry**: unique short codes, atomic room membership, an idle
//!   sweeper ([`registry`], [`codes`], [`sweeper`])
//! - **Fan-out**: per-connection queues and room groups ([`broadcast`])
//!
//! A disconnected player gets one grace window per game; the game freezes
//! (and the turn clock pauses) until they return or forfeit. Finished games
//! may be restarted in place through the rematch window ([`rematch`]).
//!
//! # Example
//!
//! ```no_run
//! use tictactoe_rooms::config::Settings;
//! use tictactoe_rooms::server::{self, AppState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let state = AppState::new(Settings::default());
//! server::run(state, "0.0.0.0").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod broadcast;
pub mod cli;
pub mod codes;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod registry;
pub mod rematch;
pub mod room;
pub mod server;
pub mod sweeper;
pub mod timers;

pub use broadcast::{Broadcaster, ConnectionId};
pub use codes::CodeGenerator;
pub use config::Settings;
pub use engine::{Board, Cell, Mark, MoveOutcome};
pub use error::ErrorCode;
pub use messages::{ClientMessage, GameOverPayload, GameResult, RpcResponse, ServerMessage};
pub use registry::{RoomRegistry, SharedRoom};
pub use room::{Event, Phase, Player, PlayerId, Room, StateSnapshot, TimerHandle};
pub use server::AppState;
