//! Robot move selection.
//!
//! Tiers, each consulted only when every earlier tier comes up empty:
//!
//! 1. take an immediate win;
//! 2. block the player's immediate win;
//! 3. take the center;
//! 4. take a random free corner;
//! 5. take a random free edge.

use super::win::check_win;
use crate::{Board, Move, Side};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// First empty cell, row-major, where a mark for `side` completes a line.
///
/// Trial marks go through [`Board::speculate`] on a scratch copy, so
/// `board` is never touched.
#[instrument(skip(board), fields(board = %board))]
pub fn finishing_move(board: &Board, side: Side) -> Option<Move> {
    let mut scratch = *board;
    board
        .empty_cells()
        .into_iter()
        .find(|at| scratch.speculate(*at, side, |b| check_win(b, side)))
}

/// Chooses the robot's next move.
///
/// Returns `None` only when the board is full; callers check for a win or
/// draw first.
#[instrument(skip(board, rng), fields(board = %board))]
pub fn choose_robot_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Move> {
    if let Some(at) = finishing_move(board, Side::Robot) {
        debug!(%at, "Taking winning cell");
        return Some(at);
    }

    if let Some(at) = finishing_move(board, Side::Player) {
        debug!(%at, "Blocking player");
        return Some(at);
    }

    if board.is_empty(Move::CENTER) {
        debug!("Taking center");
        return Some(Move::CENTER);
    }

    if let Some(at) = random_free(board, &Move::CORNERS, rng) {
        debug!(%at, "Taking corner");
        return Some(at);
    }

    if let Some(at) = random_free(board, &Move::EDGES, rng) {
        debug!(%at, "Taking edge");
        return Some(at);
    }

    // Center, corners and edges cover all nine cells.
    debug_assert!(board.is_full(), "free cell left unselected on {}", board);
    None
}

fn random_free<R: Rng + ?Sized>(board: &Board, cells: &[Move], rng: &mut R) -> Option<Move> {
    let free: Vec<Move> = cells.iter().copied().filter(|at| board.is_empty(*at)).collect();
    free.choose(rng).copied()
}
