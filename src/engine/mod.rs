//! Pure tic-tac-toe rules.
//!
//! Nothing in this module touches rooms, timers, or the transport; it is
//! a board, two marks, and the functions that move a game forward.

mod rules;

pub use rules::check_winner;

use rand::Rng;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A player mark. X always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// The X mark (moves first).
    X,
    /// The O mark.
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// A single board cell. Serialized on the wire as 0 (empty), 1 (X), 2 (O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cell {
    /// Nobody has played here.
    Empty = 0,
    /// Occupied by X.
    X = 1,
    /// Occupied by O.
    O = 2,
}

impl Cell {
    /// The mark occupying this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::X),
            2 => Ok(Cell::O),
            other => Err(D::Error::custom(format!("invalid cell value {other}"))),
        }
    }
}

/// The 3x3 board, cells in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; 9],
        }
    }

    /// The cell at `index`, or `None` out of range.
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// True when no cell is empty.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| *c != Cell::Empty)
    }

    #[cfg(test)]
    pub(crate) fn from_cells(cells: [Cell; 9]) -> Self {
        Self { cells }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of attempting a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The index was outside 0..9.
    InvalidIndex,
    /// The cell is already occupied.
    CellTaken,
    /// The move completed a line; the mover wins.
    Win(Mark),
    /// The board is full with no winner.
    Draw,
    /// Play continues; the contained mark moves next.
    Continue(Mark),
}

/// Applies `mark` at `index`, returning what the move did.
///
/// The board is only written when the move is legal. Win detection runs
/// before the draw check so a final-cell winning move reports `Win`.
pub fn apply_move(board: &mut Board, mark: Mark, index: usize) -> MoveOutcome {
    if index >= 9 {
        return MoveOutcome::InvalidIndex;
    }
    if board.cells[index] != Cell::Empty {
        return MoveOutcome::CellTaken;
    }
    board.cells[index] = mark.into();

    if check_winner(board) == Some(mark) {
        return MoveOutcome::Win(mark);
    }
    if board.is_full() {
        return MoveOutcome::Draw;
    }
    MoveOutcome::Continue(mark.opponent())
}

/// Randomly orders the two marks for the two seats, each order equally
/// likely. The first element goes to the first player in join order.
pub fn assign_marks<R: Rng>(rng: &mut R) -> (Mark, Mark) {
    if rng.gen_bool(0.5) {
        (Mark::X, Mark::O)
    } else {
        (Mark::O, Mark::X)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        assert!(board.cells().iter().all(|c| *c == Cell::Empty));
        assert!(!board.is_full());
    }

    #[test]
    fn test_apply_move_rejects_out_of_range() {
        let mut board = Board::new();
        assert_eq!(apply_move(&mut board, Mark::X, 9), MoveOutcome::InvalidIndex);
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_apply_move_rejects_taken_cell() {
        let mut board = Board::new();
        apply_move(&mut board, Mark::X, 4);
        assert_eq!(apply_move(&mut board, Mark::O, 4), MoveOutcome::CellTaken);
        assert_eq!(board.get(4), Some(Cell::X));
    }

    #[test]
    fn test_continue_toggles_mark() {
        let mut board = Board::new();
        assert_eq!(apply_move(&mut board, Mark::X, 0), MoveOutcome::Continue(Mark::O));
        assert_eq!(apply_move(&mut board, Mark::O, 1), MoveOutcome::Continue(Mark::X));
    }

    #[test]
    fn test_win_on_top_row() {
        let mut board = Board::new();
        apply_move(&mut board, Mark::X, 0);
        apply_move(&mut board, Mark::O, 3);
        apply_move(&mut board, Mark::X, 1);
        apply_move(&mut board, Mark::O, 4);
        assert_eq!(apply_move(&mut board, Mark::X, 2), MoveOutcome::Win(Mark::X));
    }

    #[test]
    fn test_win_on_final_cell_beats_draw() {
        // X fills the last open cell and completes the right column 2-5-8.
        let mut board = Board::from_cells([
            Cell::X,
            Cell::O,
            Cell::X,
            Cell::O,
            Cell::O,
            Cell::X,
            Cell::O,
            Cell::X,
            Cell::Empty,
        ]);
        assert_eq!(apply_move(&mut board, Mark::X, 8), MoveOutcome::Win(Mark::X));
    }

    #[test]
    fn test_draw_when_board_fills() {
        // X: 0 2 5 6 7, O: 1 3 4 8 -- no line for either.
        let mut board = Board::new();
        let moves = [
            (Mark::X, 0),
            (Mark::O, 1),
            (Mark::X, 2),
            (Mark::O, 3),
            (Mark::X, 5),
            (Mark::O, 4),
            (Mark::X, 6),
            (Mark::O, 8),
        ];
        for (mark, index) in moves {
            assert!(matches!(
                apply_move(&mut board, mark, index),
                MoveOutcome::Continue(_)
            ));
        }
        assert_eq!(apply_move(&mut board, Mark::X, 7), MoveOutcome::Draw);
        assert!(board.is_full());
    }

    #[test]
    fn test_assign_marks_covers_both_orders() {
        let mut seen_x_first = false;
        let mut seen_o_first = false;
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            match assign_marks(&mut rng) {
                (Mark::X, Mark::O) => seen_x_first = true,
                (Mark::O, Mark::X) => seen_o_first = true,
                other => panic!("impossible assignment {other:?}"),
            }
        }
        assert!(seen_x_first && seen_o_first);
    }

    #[test]
    fn test_board_serializes_as_integers() {
        let mut board = Board::new();
        apply_move(&mut board, Mark::X, 0);
        apply_move(&mut board, Mark::O, 4);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, "[1,0,0,0,2,0,0,0,0]");
        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }
}
