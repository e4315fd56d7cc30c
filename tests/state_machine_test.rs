//! Tests for the room lifecycle state machine.

use tictactoe_rooms::room::{next, Event, Phase};

#[test]
fn test_normal_game_lifecycle() {
    let mut phase = Phase::WaitingForPlayers;
    phase = next(phase, Event::PlayerJoined).unwrap();
    assert_eq!(phase, Phase::Active);
    phase = next(phase, Event::MoveMade).unwrap();
    phase = next(phase, Event::PlayerDisconnected).unwrap();
    assert_eq!(phase, Phase::Active);
    phase = next(phase, Event::GameDrawn).unwrap();
    assert_eq!(phase, Phase::GameOver);
}

#[test]
fn test_forfeit_ends_an_active_game() {
    assert_eq!(
        next(Phase::Active, Event::PlayerForfeited).unwrap(),
        Phase::GameOver
    );
}

#[test]
fn test_full_rematch_cycle() {
    let mut phase = Phase::GameOver;
    phase = next(phase, Event::RematchOffered).unwrap();
    assert_eq!(phase, Phase::RematchOffered);
    phase = next(phase, Event::RematchAccepted).unwrap();
    assert_eq!(phase, Phase::RematchAccepted);
    phase = next(phase, Event::FirstMoveMade).unwrap();
    assert_eq!(phase, Phase::Active);
}

#[test]
fn test_rematch_window_can_expire_instead() {
    let phase = next(Phase::RematchOffered, Event::RematchExpired).unwrap();
    assert_eq!(phase, Phase::RematchExpired);
    // Expired is a dead end short of closing.
    assert!(next(phase, Event::RematchOffered).is_err());
    assert!(next(phase, Event::PlayerJoined).is_err());
}

#[test]
fn test_room_closed_from_every_phase() {
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
fn test_closed_is_terminal() {
    for event in [
        Event::PlayerJoined,
        Event::MoveMade,
        Event::GameWon,
        Event::RematchOffered,
        Event::FirstMoveMade,
    ] {
        assert!(next(Phase::Closed, event).is_err(), "{event:?}");
    }
}

#[test]
fn test_invalid_pairs_do_not_transition() {
    let invalid = [
        (Phase::WaitingForPlayers, Event::MoveMade),
        (Phase::WaitingForPlayers, Event::GameWon),
        (Phase::Active, Event::PlayerJoined),
        (Phase::Active, Event::RematchOffered),
        (Phase::GameOver, Event::MoveMade),
        (Phase::GameOver, Event::RematchAccepted),
        (Phase::GameOver, Event::RematchExpired),
        (Phase::RematchOffered, Event::MoveMade),
        (Phase::RematchAccepted, Event::MoveMade),
        (Phase::RematchAccepted, Event::RematchAccepted),
    ];
    for (phase, event) in invalid {
        let err = next(phase, event).unwrap_err();
        assert_eq!(err.phase, phase);
        assert_eq!(err.event, event);
    }
}
