//! # duelroom-engine: Tic-Tac-Toe Rules Core
//!
//! Pure, allocation-free game logic for the two-player rooms served by
//! `duelroom_web`. Nothing here knows about players, rooms or sockets.
//!
//! ## Core Modules
//!
//! - [`board`] - 3×3 board representation and move application
//! - [`mark`] - The `x` / `o` symbols
//! - [`rules`] - Winning lines and win/draw evaluation
//! - [`errors`] - Error types for illegal moves
//!
//! ## Quick Start
//!
//! ```rust
//! use duelroom_engine::board::Board;
//! use duelroom_engine::mark::Mark;
//! use duelroom_engine::rules::{evaluate, Outcome};
//!
//! let board = Board::empty()
//!     .apply_move(0, Mark::X)
//!     .and_then(|b| b.apply_move(4, Mark::O))
//!     .expect("both cells were empty");
//!
//! assert_eq!(evaluate(&board), Outcome::InProgress);
//! ```

pub mod board;
pub mod errors;
pub mod mark;
pub mod rules;

pub use board::{Board, CELL_COUNT};
pub use errors::GameError;
pub use mark::Mark;
pub use rules::{evaluate, Outcome, WINNING_LINES};
