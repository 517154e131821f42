use crate::errors::GameError;
use crate::mark::Mark;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of cells on a 3×3 board.
pub const CELL_COUNT: usize = 9;

/// A 3×3 tic-tac-toe board stored row-major (`0,1,2 / 3,4,5 / 6,7,8`).
///
/// Serializes as a 9-element array of `"x"`, `"o"` or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Mark>; CELL_COUNT],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a board from explicit cell contents.
    ///
    /// ```
    /// use duelroom_engine::board::Board;
    /// use duelroom_engine::mark::Mark::{O, X};
    ///
    /// let board = Board::from_cells([Some(X), Some(X), Some(X), Some(O), Some(O), None, None, None, None]);
    /// assert_eq!(board.marks_placed(), 5);
    /// ```
    pub fn from_cells(cells: [Option<Mark>; CELL_COUNT]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.cells
    }

    /// Contents of the cell at `index`, `None` when empty or out of range.
    pub fn cell(&self, index: usize) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn marks_placed(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Places `mark` at `index` and returns the resulting board.
    ///
    /// The receiver is left untouched; only the targeted cell differs in the
    /// returned board.
    ///
    /// # Errors
    ///
    /// - [`GameError::IndexOutOfRange`] when `index` is not in `0..9`
    /// - [`GameError::CellOccupied`] when the cell already holds a mark
    ///
    /// # Examples
    ///
    /// ```
    /// use duelroom_engine::board::Board;
    /// use duelroom_engine::errors::GameError;
    /// use duelroom_engine::mark::Mark;
    ///
    /// let board = Board::empty().apply_move(4, Mark::X).unwrap();
    /// assert_eq!(board.cell(4), Some(Mark::X));
    ///
    /// let err = board.apply_move(4, Mark::O).unwrap_err();
    /// assert_eq!(err, GameError::CellOccupied { index: 4 });
    /// ```
    pub fn apply_move(&self, index: usize, mark: Mark) -> Result<Board, GameError> {
        let slot = self
            .cells
            .get(index)
            .ok_or(GameError::IndexOutOfRange { index })?;
        if slot.is_some() {
            return Err(GameError::CellOccupied { index });
        }

        let mut next = *self;
        next.cells[index] = Some(mark);
        Ok(next)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.cells.chunks(3).enumerate() {
            if row > 0 {
                f.write_str("/")?;
            }
            for cell in chunk {
                f.write_str(cell.map(Mark::as_str).unwrap_or("."))?;
            }
        }
        Ok(())
    }
}
