//! Tests for mutable room state: seating, move gating, forfeits, and the
//! rematch reset.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tictactoe_rooms::engine::{Cell, Mark, MoveOutcome};
use tictactoe_rooms::error::ErrorCode;
use tictactoe_rooms::room::{Phase, Room};

const MAX_PLAYERS: usize = 2;

fn rng() -> StdRng {
    StdRng::seed_from_u64(11)
}

fn started_room() -> Room {
    let mut room = Room::new("ABC234".to_string());
    room.add_connection("p1", "conn1", MAX_PLAYERS);
    room.add_connection("p2", "conn2", MAX_PLAYERS);
    assert!(room.try_start_game(&mut rng()));
    room
}

fn connection_with_mark(room: &Room, mark: Mark) -> String {
    room.player_with_mark(mark)
        .and_then(|p| p.connection_id.clone())
        .expect("mark holder should be connected")
}

#[test]
fn test_add_connection_is_idempotent() {
    let mut room = Room::new("ABC234".to_string());
    assert!(room.add_connection("p1", "conn1", MAX_PLAYERS));
    assert!(room.add_connection("p1", "conn1", MAX_PLAYERS));
    assert_eq!(room.players.len(), 1);
    assert_eq!(room.player_order, vec!["p1".to_string()]);
}

#[test]
fn test_one_connection_cannot_hold_two_seats() {
    let mut room = Room::new("ABC234".to_string());
    assert!(room.add_connection("p1", "conn1", MAX_PLAYERS));
    assert!(!room.add_connection("p2", "conn1", MAX_PLAYERS));
    assert_eq!(room.players.len(), 1);
}

#[test]
fn test_capacity_is_enforced() {
    let mut room = Room::new("ABC234".to_string());
    assert!(room.add_connection("p1", "conn1", MAX_PLAYERS));
    assert!(room.add_connection("p2", "conn2", MAX_PLAYERS));
    assert!(!room.add_connection("p3", "conn3", MAX_PLAYERS));
    assert!(!room.can_join(MAX_PLAYERS));
    assert_eq!(room.player_order.len(), 2);
}

#[test]
fn test_start_assigns_both_marks_and_gives_x_the_turn() {
    let room = started_room();
    let marks: Vec<_> = room.players.values().filter_map(|p| p.mark).collect();
    assert_eq!(marks.len(), 2);
    assert!(marks.contains(&Mark::X));
    assert!(marks.contains(&Mark::O));
    assert_eq!(room.current_turn, Some(Mark::X));
    assert_eq!(room.phase, Phase::Active);
}

#[test]
fn test_start_requires_two_players() {
    let mut room = Room::new("ABC234".to_string());
    room.add_connection("p1", "conn1", MAX_PLAYERS);
    assert!(!room.try_start_game(&mut rng()));
    assert_eq!(room.phase, Phase::WaitingForPlayers);
}

#[test]
fn test_start_does_not_reassign_marks() {
    let mut room = started_room();
    assert!(!room.try_start_game(&mut rng()));
}

#[test]
fn test_move_gates_fire_in_order() {
    let mut room = started_room();
    let x_conn = connection_with_mark(&room, Mark::X);
    let o_conn = connection_with_mark(&room, Mark::O);

    // Stranger first.
    assert_eq!(
        room.try_make_move("nobody", 0),
        Err(ErrorCode::NotInGame)
    );
    // Wrong turn.
    assert_eq!(
        room.try_make_move(&o_conn, 0),
        Err(ErrorCode::NotYourTurn)
    );
    // Disconnected opponent freezes the game even for the turn holder.
    room.players.get_mut("p2").unwrap().connection_id = None;
    let gate = if room.player_with_mark(Mark::X).unwrap().is_connected() {
        room.try_make_move(&x_conn, 0)
    } else {
        // X was the one we disconnected; O is refused the same way.
        room.try_make_move(&o_conn, 0)
    };
    assert_eq!(gate, Err(ErrorCode::OpponentDisconnected));
    room.players.get_mut("p2").unwrap().connection_id = Some("conn2".to_string());

    // Engine-level failures come last.
    assert_eq!(
        room.try_make_move(&x_conn, 99),
        Err(ErrorCode::InvalidIndex)
    );
    assert!(matches!(
        room.try_make_move(&x_conn, 4),
        Ok(MoveOutcome::Continue(Mark::O))
    ));
    assert_eq!(room.try_make_move(&o_conn, 4), Err(ErrorCode::CellTaken));
}

#[test]
fn test_finished_game_refuses_moves() {
    let mut room = started_room();
    let x_conn = connection_with_mark(&room, Mark::X);
    let o_conn = connection_with_mark(&room, Mark::O);
    for (conn, index) in [
        (&x_conn, 0),
        (&o_conn, 3),
        (&x_conn, 1),
        (&o_conn, 4),
        (&x_conn, 2),
    ] {
        room.try_make_move(conn, index).unwrap();
    }
    assert!(room.is_game_over);
    assert_eq!(room.winner, Some(Mark::X));
    assert_eq!(room.current_turn, None);
    assert_eq!(room.try_make_move(&o_conn, 5), Err(ErrorCode::GameOver));
}

#[test]
fn test_forfeit_awards_the_opponent() {
    let mut room = started_room();
    let x_player = room.player_with_mark(Mark::X).unwrap().player_id.clone();
    room.forfeit(&x_player);
    assert!(room.is_game_over);
    assert_eq!(room.winner, Some(Mark::O));
    assert_eq!(room.current_turn, None);
}

#[test]
fn test_rematch_reset_restores_every_game_start_invariant() {
    let mut room = started_room();
    let x_conn = connection_with_mark(&room, Mark::X);
    let o_conn = connection_with_mark(&room, Mark::O);
    room.try_make_move(&x_conn, 0).unwrap();
    room.try_make_move(&o_conn, 4).unwrap();
    room.players.get_mut("p1").unwrap().grace_used = true;
    room.players.get_mut("p1").unwrap().remaining_turn_seconds = Some(12);
    room.rematch_offers.insert("p1".to_string());
    let version_before = room.turn_timer_version;

    room.reset_for_rematch(&mut rng());

    assert!(room.board.cells().iter().all(|c| *c == Cell::Empty));
    assert!(!room.is_game_over);
    assert_eq!(room.winner, None);
    assert_eq!(room.current_turn, Some(Mark::X));
    assert!(room.rematch_offers.is_empty());
    assert_eq!(room.rematch_expires_at, None);
    assert!(room.turn_timer_version > version_before);
    for player in room.players.values() {
        assert!(!player.grace_used);
        assert!(player.mark.is_some());
        assert_eq!(player.remaining_turn_seconds, None);
        assert_eq!(player.reconnection_expires_at, None);
        assert_eq!(player.turn_expires_at, None);
    }
}

#[test]
fn test_idle_predicate_needs_both_quiet_and_unstarted() {
    let timeout = Duration::from_secs(300);
    let mut room = Room::new("ABC234".to_string());
    room.add_connection("p1", "conn1", MAX_PLAYERS);

    // Fresh single-player room: not idle yet.
    assert!(!room.is_idle_for_cleanup(timeout));

    // Quiet past the threshold: idle.
    room.last_activity_at = Instant::now()
        .checked_sub(Duration::from_secs(400))
        .expect("clock too close to boot");
    assert!(room.is_idle_for_cleanup(timeout));

    // A started game never matches the quiet clause.
    let mut room = started_room();
    room.last_activity_at = Instant::now()
        .checked_sub(Duration::from_secs(400))
        .expect("clock too close to boot");
    assert!(!room.is_idle_for_cleanup(timeout));

    // Unless everyone is gone.
    for player in room.players.values_mut() {
        player.connection_id = None;
    }
    assert!(room.is_idle_for_cleanup(timeout));
}

#[test]
fn test_snapshot_is_per_player() {
    let room = started_room();
    let p1_mark = room.players.get("p1").unwrap().mark;
    let snapshot = room.state_for(Some("p1"));
    assert_eq!(snapshot.symbol, p1_mark);
    assert_eq!(snapshot.current_turn, Some(Mark::X));
    assert!(!snapshot.is_game_over);
    let stranger = room.state_for(Some("nobody"));
    assert_eq!(stranger.symbol, None);
}
