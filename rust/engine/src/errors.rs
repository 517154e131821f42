use thiserror::Error;

/// Reasons a move cannot be placed on the board.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum GameError {
    #[error("Cell index {index} is outside the board (0-8)")]
    IndexOutOfRange { index: usize },
    #[error("Cell {index} is already occupied")]
    CellOccupied { index: usize },
}
