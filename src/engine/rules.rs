//! Win detection over the eight board lines.

use super::{Board, Mark};

/// The 8 winning lines: 3 rows, 3 columns, 2 diagonals.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the mark holding a complete line, if any.
pub fn check_winner(board: &Board) -> Option<Mark> {
    let cells = board.cells();
    for [a, b, c] in LINES {
        if cells[a] != super::Cell::Empty && cells[a] == cells[b] && cells[b] == cells[c] {
            return cells[a].mark();
        }
    }
    None
}
