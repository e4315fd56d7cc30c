//! Room lifecycle state machine.
//!
//! Every room owns one `Phase` and advances it through [`next`]. Invalid
//! (phase, event) pairs are rejected without mutating anything; callers log
//! the rejection and move on. `Closed` is terminal.

use derive_more::{Display, Error};
use serde::Serialize;

/// Lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Created, fewer than two players seated.
    WaitingForPlayers,
    /// Both players seated, game running.
    Active,
    /// Game finished (win, draw, or forfeit).
    GameOver,
    /// One player has offered a rematch.
    RematchOffered,
    /// Both players elected a rematch; waiting on the first move.
    RematchAccepted,
    /// The rematch window lapsed without agreement.
    RematchExpired,
    /// Terminal.
    Closed,
}

/// Events that drive the room lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The room filled and the game started.
    PlayerJoined,
    /// A legal mid-game move was applied.
    MoveMade,
    /// A move completed a line.
    GameWon,
    /// The board filled with no winner.
    GameDrawn,
    /// A player forfeited (grace exhausted or turn timeout).
    PlayerForfeited,
    /// A player's connection dropped mid-game.
    PlayerDisconnected,
    /// A player offered a rematch.
    RematchOffered,
    /// Both players agreed to a rematch.
    RematchAccepted,
    /// The rematch window lapsed.
    RematchExpired,
    /// The first move of a rematch game was applied.
    FirstMoveMade,
    /// The room is being removed.
    RoomClosed,
}

/// A (phase, event) pair with no transition.
#[derive(Debug, Clone, Copy, Display, Error)]
#[display("no transition from {phase:?} on {event:?}")]
pub struct InvalidTransition {
    /// Phase the room was in.
    pub phase: Phase,
    /// Event that was rejected.
    pub event: Event,
}

/// Computes the successor phase, or an error for an invalid pair.
pub fn next(phase: Phase, event: Event) -> Result<Phase, InvalidTransition> {
    use Event as E;
    use Phase as P;

    let to = match (phase, event) {
        (_, E::RoomClosed) => P::Closed,
        (P::WaitingForPlayers, E::PlayerJoined) => P::Active,
        (P::Active, E::MoveMade) => P::Active,
        (P::Active, E::GameWon | E::GameDrawn | E::PlayerForfeited) => P::GameOver,
        (P::Active, E::PlayerDisconnected) => P::Active,
        (P::GameOver, E::RematchOffered) => P::RematchOffered,
        (P::RematchOffered, E::RematchAccepted) => P::RematchAccepted,
        (P::RematchOffered, E::RematchExpired) => P::RematchExpired,
        (P::RematchAccepted, E::FirstMoveMade) => P::Active,
        _ => return Err(InvalidTransition { phase, event }),
    };
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_to_game_over() {
        let mut phase = Phase::WaitingForPlayers;
        for event in [Event::PlayerJoined, Event::MoveMade, Event::MoveMade, Event::GameWon] {
            phase = next(phase, event).unwrap();
        }
        assert_eq!(phase, Phase::GameOver);
    }

    #[test]
    fn test_rematch_cycle_returns_to_active() {
        let mut phase = Phase::GameOver;
        for event in [Event::RematchOffered, Event::RematchAccepted, Event::FirstMoveMade] {
            phase = next(phase, event).unwrap();
        }
        assert_eq!(phase, Phase::Active);
    }

    #[test]
    fn test_disconnect_keeps_active() {
        assert_eq!(
            next(Phase::Active, Event::PlayerDisconnected).unwrap(),
            Phase::Active
        );
    }

    #[test]
    fn test_rematch_window_expiry() {
        assert_eq!(
            next(Phase::RematchOffered, Event::RematchExpired).unwrap(),
            Phase::RematchExpired
        );
    }

    #[test]
    fn test_any_phase_closes() {
        for phase in [
            Phase::WaitingForPlayers,
            Phase::Active,
            Phase::GameOver,
            Phase::RematchOffered,
            Phase::RematchAccepted,
            Phase::RematchExpired,
        ] {
            assert_eq!(next(phase, Event::RoomClosed).unwrap(), Phase::Closed);
        }
    }

    #[test]
    fn test_invalid_pairs_rejected() {
        assert!(next(Phase::WaitingForPlayers, Event::MoveMade).is_err());
        assert!(next(Phase::GameOver, Event::MoveMade).is_err());
        assert!(next(Phase::GameOver, Event::RematchAccepted).is_err());
        assert!(next(Phase::RematchExpired, Event::RematchOffered).is_err());
        assert!(next(Phase::Closed, Event::PlayerJoined).is_err());
    }

    #[test]
    fn test_machine_never_reverts_without_close() {
        // A finished game cannot re-enter Active except through the rematch cycle.
        assert!(next(Phase::GameOver, Event::PlayerJoined).is_err());
        assert!(next(Phase::GameOver, Event::FirstMoveMade).is_err());
    }
}
