use duelroom_engine::board::{Board, CELL_COUNT};
use duelroom_engine::errors::GameError;
use duelroom_engine::mark::Mark;

/// Every board reachable by filling cells with x, o or nothing (3^9 of them).
fn all_boards() -> impl Iterator<Item = Board> {
    (0..3usize.pow(CELL_COUNT as u32)).map(|mut code| {
        let mut cells = [None; CELL_COUNT];
        for cell in cells.iter_mut() {
            *cell = match code % 3 {
                0 => None,
                1 => Some(Mark::X),
                _ => Some(Mark::O),
            };
            code /= 3;
        }
        Board::from_cells(cells)
    })
}

#[test]
fn apply_move_changes_only_the_target_cell() {
    for board in all_boards() {
        for index in 0..CELL_COUNT {
            for mark in [Mark::X, Mark::O] {
                match board.apply_move(index, mark) {
                    Ok(next) => {
                        assert_eq!(board.cell(index), None);
                        assert_eq!(next.cell(index), Some(mark));
                        for other in (0..CELL_COUNT).filter(|&i| i != index) {
                            assert_eq!(next.cell(other), board.cell(other));
                        }
                    }
                    Err(err) => {
                        assert_eq!(err, GameError::CellOccupied { index });
                        assert!(board.cell(index).is_some());
                    }
                }
            }
        }
    }
}

#[test]
fn apply_move_leaves_source_board_untouched() {
    let board = Board::empty();
    let next = board.apply_move(3, Mark::O).expect("empty cell");
    assert_eq!(board, Board::empty());
    assert_ne!(board, next);
}

#[test]
fn indices_past_the_grid_are_illegal() {
    for index in [9, 10, usize::MAX] {
        assert_eq!(
            Board::empty().apply_move(index, Mark::X),
            Err(GameError::IndexOutOfRange { index })
        );
    }
}

#[test]
fn full_board_reports_full() {
    let mut board = Board::empty();
    for index in 0..CELL_COUNT {
        assert!(!board.is_full());
        board = board
            .apply_move(index, if index % 2 == 0 { Mark::X } else { Mark::O })
            .expect("cell is empty");
    }
    assert!(board.is_full());
    assert_eq!(board.marks_placed(), CELL_COUNT);
}
