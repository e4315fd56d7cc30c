//! Error codes returned in RPC response envelopes.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

/// Every way an RPC can fail, as it appears on the wire.
///
/// Validation failures surface as `Invalid`/`InvalidIndex`/`NotFound`;
/// everything else is an operation rejected by room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Error)]
pub enum ErrorCode {
    /// Move index outside the board.
    InvalidIndex,
    /// Target cell is occupied.
    CellTaken,
    /// Caller does not hold the current turn.
    NotYourTurn,
    /// A player in the room is disconnected.
    OpponentDisconnected,
    /// The game has already ended.
    GameOver,
    /// Malformed request input.
    Invalid,
    /// No room with that code.
    NotFound,
    /// The room already has its full complement of players.
    RoomFull,
    /// The caller's connection already holds a seat in this room.
    AlreadyInRoom,
    /// The seat exists but is disconnected; use Reconnect.
    ReconnectRequired,
    /// The player id is attached to another live connection.
    PlayerIdInUse,
    /// The caller has no seat in this room.
    NotInGame,
    /// Reconnection was rejected.
    ReconnectFailed,
    /// Rematch offer was rejected.
    OfferFailed,
    /// Rematch acceptance was rejected.
    AcceptFailed,
}

impl ErrorCode {
    /// The fixed human-readable message paired with this code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InvalidIndex => "Move index must be between 0 and 8",
            ErrorCode::CellTaken => "That cell is already taken",
            ErrorCode::NotYourTurn => "It is not your turn",
            ErrorCode::OpponentDisconnected => {
                "Cannot move while your opponent is disconnected"
            }
            ErrorCode::GameOver => "The game is already over",
            ErrorCode::Invalid => "Invalid request",
            ErrorCode::NotFound => "Room not found",
            ErrorCode::RoomFull => "Room is full",
            ErrorCode::AlreadyInRoom => "You are already in this room",
            ErrorCode::ReconnectRequired => "Reconnect required to resume your seat",
            ErrorCode::PlayerIdInUse => "Player id is in use by another connection",
            ErrorCode::NotInGame => "You are not a player in this game",
            ErrorCode::ReconnectFailed => "Unable to reconnect to the room",
            ErrorCode::OfferFailed => "Unable to offer a rematch",
            ErrorCode::AcceptFailed => "Unable to accept the rematch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_as_pascal_case_names() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::NotYourTurn).unwrap(),
            "\"NotYourTurn\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::OpponentDisconnected).unwrap(),
            "\"OpponentDisconnected\""
        );
    }

    #[test]
    fn test_every_code_has_a_message() {
        let codes = [
            ErrorCode::InvalidIndex,
            ErrorCode::CellTaken,
            ErrorCode::NotYourTurn,
            ErrorCode::OpponentDisconnected,
            ErrorCode::GameOver,
            ErrorCode::Invalid,
            ErrorCode::NotFound,
            ErrorCode::RoomFull,
            ErrorCode::AlreadyInRoom,
            ErrorCode::ReconnectRequired,
            ErrorCode::PlayerIdInUse,
            ErrorCode::NotInGame,
            ErrorCode::ReconnectFailed,
            ErrorCode::OfferFailed,
            ErrorCode::AcceptFailed,
        ];
        for code in codes {
            assert!(!code.message().is_empty());
        }
    }
}
