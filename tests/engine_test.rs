//! Tests for the pure game engine.

use tictactoe_rooms::engine::{apply_move, check_winner, Board, Cell, Mark, MoveOutcome};

fn play_all(board: &mut Board, moves: &[(Mark, usize)]) -> Vec<MoveOutcome> {
    moves
        .iter()
        .map(|(mark, index)| apply_move(board, *mark, *index))
        .collect()
}

#[test]
fn test_x_top_row_win_sequence() {
    // X plays 0, 1, 2 against O on 3, 4.
    let mut board = Board::new();
    let outcomes = play_all(
        &mut board,
        &[
            (Mark::X, 0),
            (Mark::O, 3),
            (Mark::X, 1),
            (Mark::O, 4),
            (Mark::X, 2),
        ],
    );
    assert_eq!(outcomes.last(), Some(&MoveOutcome::Win(Mark::X)));
    assert_eq!(
        board.cells(),
        &[
            Cell::X,
            Cell::X,
            Cell::X,
            Cell::O,
            Cell::O,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
        ]
    );
    assert_eq!(check_winner(&board), Some(Mark::X));
}

#[test]
fn test_full_board_draw_sequence() {
    // X0 O1 X2 O3 X5 O4 X6 O8 X7 fills the board with no line.
    let mut board = Board::new();
    let outcomes = play_all(
        &mut board,
        &[
            (Mark::X, 0),
            (Mark::O, 1),
            (Mark::X, 2),
            (Mark::O, 3),
            (Mark::X, 5),
            (Mark::O, 4),
            (Mark::X, 6),
            (Mark::O, 8),
            (Mark::X, 7),
        ],
    );
    assert_eq!(outcomes.last(), Some(&MoveOutcome::Draw));
    assert!(board.is_full());
    assert_eq!(check_winner(&board), None);
    assert!(board.cells().iter().all(|c| *c != Cell::Empty));
}

#[test]
fn test_column_and_diagonal_wins_detected() {
    let mut board = Board::new();
    play_all(
        &mut board,
        &[
            (Mark::O, 1),
            (Mark::X, 0),
            (Mark::O, 4),
            (Mark::X, 2),
            (Mark::O, 7),
        ],
    );
    assert_eq!(check_winner(&board), Some(Mark::O));

    let mut board = Board::new();
    play_all(
        &mut board,
        &[
            (Mark::X, 0),
            (Mark::O, 1),
            (Mark::X, 4),
            (Mark::O, 2),
            (Mark::X, 8),
        ],
    );
    assert_eq!(check_winner(&board), Some(Mark::X));
}

#[test]
fn test_out_of_range_and_taken_cells_leave_board_alone() {
    let mut board = Board::new();
    assert_eq!(apply_move(&mut board, Mark::X, 42), MoveOutcome::InvalidIndex);
    assert_eq!(board, Board::new());

    apply_move(&mut board, Mark::X, 4);
    let before = board.clone();
    assert_eq!(apply_move(&mut board, Mark::O, 4), MoveOutcome::CellTaken);
    assert_eq!(board, before);
}

#[test]
fn test_winner_is_the_mover_never_the_opponent() {
    // O completes a line; the reported winner must be O even though X has
    // more marks down.
    let mut board = Board::new();
    play_all(
        &mut board,
        &[
            (Mark::X, 0),
            (Mark::O, 3),
            (Mark::X, 1),
            (Mark::O, 4),
            (Mark::X, 8),
        ],
    );
    assert_eq!(apply_move(&mut board, Mark::O, 5), MoveOutcome::Win(Mark::O));
}
