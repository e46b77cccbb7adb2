//! Draw detection.

use crate::Board;
use tracing::instrument;

/// True iff no empty cell remains.
///
/// Callers check for a win first: a full board with a winning line is a
/// win, not a draw.
#[instrument(skip(board), fields(board = %board))]
pub fn check_draw(board: &Board) -> bool {
    board.is_full()
}

#[cfg(test)]
mod tests {
    use super::super::win::winner;
    use super::*;

    fn is_draw(board: &Board) -> bool {
        check_draw(board) && winner(board).is_none()
    }

    #[test]
    fn test_empty_board_not_draw() {
        assert!(!check_draw(&Board::new()));
    }

    #[test]
    fn test_one_empty_cell_not_draw() {
        let b = Board::from_codes([[1, 2, 1], [1, 2, 2], [2, 1, 0]]).unwrap();
        assert!(!check_draw(&b));
    }

    #[test]
    fn test_full_board_without_winner_is_draw() {
        // X O X / X O O / O X X
        let b = Board::from_codes([[1, 2, 1], [1, 2, 2], [2, 1, 1]]).unwrap();
        assert!(is_draw(&b));
    }

    #[test]
    fn test_full_board_with_winner_is_not_draw() {
        let b = Board::from_codes([[1, 1, 1], [2, 2, 1], [1, 2, 2]]).unwrap();
        assert!(check_draw(&b));
        assert!(!is_draw(&b));
    }
}
