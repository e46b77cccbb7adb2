//! State of one tic-tac-toe game session.

use crate::inventory::{PieceInventory, SlotId};
use serde::Serialize;
use tictacarm_rules::{Board, BoardError, Move, Side};
use tracing::{info, instrument, warn};

/// Why a game ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum AbortReason {
    /// The player did not move before the poll timeout.
    #[display("no player move before timeout")]
    NoPlayerMove,
    /// The board could not be read before the first move.
    #[display("initial board scan failed")]
    InitialScanFailed,
    /// The board was not empty and the operator declined to continue.
    #[display("board not empty")]
    BoardNotEmpty,
    /// Every robot storage slot was used.
    #[display("robot out of pieces")]
    RobotOutOfPieces,
    /// A player piece appeared after every player storage slot was used.
    #[display("player out of pieces")]
    PlayerOutOfPieces,
    /// A servo command failed mid-action.
    #[display("actuator fault: {}", _0)]
    ActuatorFault(String),
}

/// Result of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum GameOutcome {
    /// The player completed a line.
    #[display("Player wins!")]
    PlayerWin,
    /// The robot completed a line.
    #[display("Robot wins!")]
    RobotWin,
    /// The board filled with no line.
    #[display("It's a draw!")]
    Draw,
    /// The game stopped early.
    #[display("Game aborted: {}", _0)]
    Aborted(AbortReason),
}

impl GameOutcome {
    /// Outcome for a completed line by `side`.
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::Player => GameOutcome::PlayerWin,
            Side::Robot => GameOutcome::RobotWin,
        }
    }

    /// True for aborted games.
    pub fn is_aborted(&self) -> bool {
        matches!(self, GameOutcome::Aborted(_))
    }
}

/// Board, piece inventories and turn of the current game.
#[derive(Debug, Clone)]
pub struct SessionState {
    board: Board,
    player_pieces: PieceInventory,
    robot_pieces: PieceInventory,
    turn: Side,
    outcome: Option<GameOutcome>,
    moves: Vec<(Side, Move)>,
}

impl SessionState {
    /// Creates a fresh session with the given number of storage slots per side.
    pub fn new(player_slots: usize, robot_slots: usize) -> Self {
        Self {
            board: Board::new(),
            player_pieces: PieceInventory::new(Side::Player, player_slots),
            robot_pieces: PieceInventory::new(Side::Robot, robot_slots),
            turn: Side::Player,
            outcome: None,
            moves: Vec::new(),
        }
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Side expected to move next.
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// Final outcome, `None` while in progress.
    pub fn outcome(&self) -> Option<&GameOutcome> {
        self.outcome.as_ref()
    }

    /// Moves committed so far.
    pub fn moves(&self) -> &[(Side, Move)] {
        &self.moves
    }

    /// Inventory for `side`.
    pub fn inventory(&self, side: Side) -> &PieceInventory {
        match side {
            Side::Player => &self.player_pieces,
            Side::Robot => &self.robot_pieces,
        }
    }

    /// Takes the next unused storage slot of `side`.
    pub fn allocate_slot(&mut self, side: Side) -> Option<SlotId> {
        match side {
            Side::Player => self.player_pieces.allocate(),
            Side::Robot => self.robot_pieces.allocate(),
        }
    }

    /// Records a move and hands the turn to the other side.
    #[instrument(skip(self))]
    pub fn commit(&mut self, side: Side, at: Move) -> Result<(), BoardError> {
        self.board.place(at, side)?;
        self.moves.push((side, at));
        self.turn = side.opponent();
        info!(%side, row = at.row(), col = at.col(), "Move committed");
        Ok(())
    }

    /// Starts from a perceived board instead of an empty one.
    ///
    /// Only allowed before any move is committed. Marks already present are
    /// not counted as moves.
    pub fn adopt_board(&mut self, board: Board) -> bool {
        if !self.moves.is_empty() {
            warn!("Refusing to replace board mid-game");
            return false;
        }
        self.board = board;
        true
    }

    /// Stores the final outcome.
    pub fn finish(&mut self, outcome: GameOutcome) {
        info!(%outcome, moves = self.moves.len(), "Game finished");
        self.outcome = Some(outcome);
    }

    /// Clears the board and refills both inventories.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.board.clear();
        self.player_pieces.reset();
        self.robot_pieces.reset();
        self.turn = Side::Player;
        self.outcome = None;
        self.moves.clear();
        info!("Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_alternates_turn() {
        let mut session = SessionState::new(5, 5);
        assert_eq!(session.turn(), Side::Player);
        session.commit(Side::Player, Move::CENTER).unwrap();
        assert_eq!(session.turn(), Side::Robot);
        assert!(session.commit(Side::Robot, Move::CENTER).is_err());
        assert_eq!(session.moves().len(), 1);
    }

    #[test]
    fn test_reset_restores_empty_state() {
        let mut session = SessionState::new(2, 2);
        session.commit(Side::Player, Move::at(0, 0)).unwrap();
        session.allocate_slot(Side::Robot);
        session.allocate_slot(Side::Player);
        session.finish(GameOutcome::Draw);

        session.reset();
        assert!(session.board().is_clear());
        assert!(session.inventory(Side::Player).all_unused());
        assert!(session.inventory(Side::Robot).all_unused());
        assert_eq!(session.outcome(), None);
        assert!(session.moves().is_empty());
    }

    #[test]
    fn test_adopt_board_only_before_moves() {
        let mut session = SessionState::new(5, 5);
        let seen = Board::from_codes([[0, 0, 0], [0, 2, 0], [0, 0, 0]]).unwrap();
        assert!(session.adopt_board(seen));
        assert_eq!(session.board(), &seen);
        session.commit(Side::Player, Move::at(0, 0)).unwrap();
        assert!(!session.adopt_board(Board::new()));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(GameOutcome::RobotWin.to_string(), "Robot wins!");
        assert_eq!(
            GameOutcome::Aborted(AbortReason::NoPlayerMove).to_string(),
            "Game aborted: no player move before timeout"
        );
        assert!(GameOutcome::Aborted(AbortReason::BoardNotEmpty).is_aborted());
    }
}
