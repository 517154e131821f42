use crate::board::Board;
use crate::mark::Mark;
use serde::{Deserialize, Serialize};

/// The eight index triples that win the game: three rows, three columns,
/// two diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of inspecting a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Winner { mark: Mark, line: [usize; 3] },
    Draw,
    InProgress,
}

impl Outcome {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }
}

/// Evaluates a board for a winner or a draw.
///
/// Lines are checked before fullness, so a full board containing a line
/// reports the win. Lines are scanned in [`WINNING_LINES`] order and the
/// first complete one is returned.
///
/// # Examples
///
/// ```
/// use duelroom_engine::board::Board;
/// use duelroom_engine::mark::Mark::{O, X};
/// use duelroom_engine::rules::{evaluate, Outcome};
///
/// let board = Board::from_cells([Some(X), Some(X), Some(X), Some(O), Some(O), None, None, None, None]);
/// assert_eq!(evaluate(&board), Outcome::Winner { mark: X, line: [0, 1, 2] });
/// ```
pub fn evaluate(board: &Board) -> Outcome {
    for line in WINNING_LINES {
        let [a, b, c] = line;
        if let Some(mark) = board.cell(a) {
            if board.cell(b) == Some(mark) && board.cell(c) == Some(mark) {
                return Outcome::Winner { mark, line };
            }
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_is_in_progress() {
        assert_eq!(evaluate(&Board::empty()), Outcome::InProgress);
    }

    #[test]
    fn three_in_a_row_decides_the_board() {
        let board = Board::from_cells([
            Some(Mark::O),
            Some(Mark::O),
            Some(Mark::O),
            Some(Mark::X),
            Some(Mark::X),
            None,
            Some(Mark::X),
            None,
            None,
        ]);
        assert!(evaluate(&board).is_decided());
        assert_eq!(
            evaluate(&board),
            Outcome::Winner {
                mark: Mark::O,
                line: [0, 1, 2]
            }
        );
    }
}
