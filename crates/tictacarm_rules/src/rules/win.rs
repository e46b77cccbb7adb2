//! Win detection.

use crate::{Board, Move, Side};
use tracing::instrument;

/// The eight winning lines: rows, columns, diagonals.
const LINES: [[Move; 3]; 8] = [
    // Rows
    [Move::at(0, 0), Move::at(0, 1), Move::at(0, 2)],
    [Move::at(1, 0), Move::at(1, 1), Move::at(1, 2)],
    [Move::at(2, 0), Move::at(2, 1), Move::at(2, 2)],
    // Columns
    [Move::at(0, 0), Move::at(1, 0), Move::at(2, 0)],
    [Move::at(0, 1), Move::at(1, 1), Move::at(2, 1)],
    [Move::at(0, 2), Move::at(1, 2), Move::at(2, 2)],
    // Diagonals
    [Move::at(0, 0), Move::at(1, 1), Move::at(2, 2)],
    [Move::at(0, 2), Move::at(1, 1), Move::at(2, 0)],
];

/// True iff some row, column or diagonal is held entirely by `side`.
#[instrument(skip(board), fields(board = %board))]
pub fn check_win(board: &Board, side: Side) -> bool {
    let mark = side.mark();
    LINES
        .iter()
        .any(|line| line.iter().all(|at| board.get(*at) == mark))
}

/// The side holding a complete line, if any.
///
/// Player is checked first; a legal game never has both.
pub fn winner(board: &Board) -> Option<Side> {
    [Side::Player, Side::Robot]
        .into_iter()
        .find(|side| check_win(board, *side))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(codes: [[u8; 3]; 3]) -> Board {
        Board::from_codes(codes).unwrap()
    }

    #[test]
    fn test_no_winner_empty_board() {
        let b = Board::new();
        assert!(!check_win(&b, Side::Player));
        assert!(!check_win(&b, Side::Robot));
        assert_eq!(winner(&b), None);
    }

    #[test]
    fn test_every_line_wins() {
        for line in LINES {
            let mut b = Board::new();
            for at in line {
                b.place(at, Side::Robot).unwrap();
            }
            assert!(check_win(&b, Side::Robot), "line {:?}", line);
            assert!(!check_win(&b, Side::Player));
        }
    }

    #[test]
    fn test_mixed_line_does_not_win() {
        let b = board([[1, 1, 2], [0, 0, 0], [0, 0, 0]]);
        assert!(!check_win(&b, Side::Player));
        assert!(!check_win(&b, Side::Robot));
    }

    #[test]
    fn test_winner_anti_diagonal() {
        let b = board([[1, 1, 2], [1, 2, 0], [2, 0, 0]]);
        assert_eq!(winner(&b), Some(Side::Robot));
    }
}
