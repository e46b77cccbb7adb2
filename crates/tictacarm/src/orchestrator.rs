//! Turn loop tying perception, rules and motion into one game.

use crate::actuator::ActuatorError;
use crate::motion::{MotionSequencer, PoseCatalog};
use crate::operator::Operator;
use crate::perception::BoardPerception;
use crate::session::{AbortReason, GameOutcome, SessionState};
use derive_getters::Getters;
use derive_setters::Setters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tictacarm_rules::{Board, Move, Side, check_draw, check_win, choose_robot_move};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Player-move polling.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct GameConfig {
    /// Time between board reads while waiting, in milliseconds.
    poll_interval_ms: u64,
    /// How long to wait for the player, in milliseconds.
    timeout_ms: u64,
}

impl GameConfig {
    /// Time between board reads.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// How long to wait for the player.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            timeout_ms: 60_000,
        }
    }
}

/// Where the game loop is.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum TurnState {
    /// Homing the arm and checking the board is empty.
    #[display("starting")]
    Starting,
    /// Polling perception for the player's piece.
    #[display("awaiting player move")]
    AwaitingPlayerMove,
    /// A player piece was seen at the cell.
    #[display("player moved {}", _0)]
    PlayerMoved(Move),
    /// Choosing the robot's cell.
    #[display("robot thinking")]
    RobotThinking,
    /// Picking and placing a robot piece.
    #[display("robot moving {}", _0)]
    RobotMoving(Move),
    /// Checking whether `side`'s last move ended the game.
    #[display("checking end after {}", _0)]
    CheckEnd(Side),
    /// Game over.
    #[display("finished: {}", _0)]
    Finished(GameOutcome),
}

/// Summary of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReport {
    /// How the game ended.
    pub outcome: GameOutcome,
    /// Board when the game ended.
    pub board: Board,
    /// Moves committed during the game.
    pub moves: usize,
}

impl std::fmt::Display for GameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} moves, board {})", self.outcome, self.moves, self.board)
    }
}

/// Runs games between the player and the arm.
///
/// The player always moves first. Reset is explicit: call
/// [`GameOrchestrator::reset`] before every game after the first.
pub struct GameOrchestrator<'a, R: Rng> {
    perception: &'a dyn BoardPerception,
    sequencer: MotionSequencer<'a>,
    poses: &'a PoseCatalog,
    operator: &'a dyn Operator,
    config: GameConfig,
    session: SessionState,
    state: TurnState,
    rng: R,
}

impl<'a, R: Rng> GameOrchestrator<'a, R> {
    /// Creates an orchestrator with a fresh session.
    pub fn new(
        perception: &'a dyn BoardPerception,
        sequencer: MotionSequencer<'a>,
        poses: &'a PoseCatalog,
        operator: &'a dyn Operator,
        config: GameConfig,
        rng: R,
    ) -> Self {
        let session = SessionState::new(
            poses.storage(Side::Player).len(),
            poses.storage(Side::Robot).len(),
        );
        Self {
            perception,
            sequencer,
            poses,
            operator,
            config,
            session,
            state: TurnState::Starting,
            rng,
        }
    }

    /// Current session.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Current state.
    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Clears the session and returns to [`TurnState::Starting`].
    pub fn reset(&mut self) {
        self.session.reset();
        self.state = TurnState::Starting;
    }

    /// Runs the game to completion.
    #[instrument(skip(self))]
    pub async fn play(&mut self) -> GameReport {
        info!("Starting new tic-tac-toe game");
        let outcome = loop {
            if let TurnState::Finished(outcome) = &self.state {
                break outcome.clone();
            }
            self.step().await;
        };
        if self.session.outcome().is_none() {
            self.session.finish(outcome.clone());
        }
        let report = GameReport {
            outcome,
            board: *self.session.board(),
            moves: self.session.moves().len(),
        };
        info!(%report, "Game over");
        report
    }

    /// Advances one state and returns the new one.
    pub async fn step(&mut self) -> &TurnState {
        let current = std::mem::replace(&mut self.state, TurnState::Starting);
        debug!(state = %current, "Advancing");
        self.state = match current {
            TurnState::Starting => self.start().await,
            TurnState::AwaitingPlayerMove => match self.wait_for_player_move().await {
                Some(at) => TurnState::PlayerMoved(at),
                None => {
                    warn!("No player move detected within timeout");
                    TurnState::Finished(GameOutcome::Aborted(AbortReason::NoPlayerMove))
                }
            },
            TurnState::PlayerMoved(at) => self.accept_player_move(at),
            TurnState::RobotThinking => match choose_robot_move(self.session.board(), &mut self.rng) {
                Some(at) => {
                    info!(row = at.row(), col = at.col(), "Robot decides to place");
                    TurnState::RobotMoving(at)
                }
                None => TurnState::Finished(GameOutcome::Draw),
            },
            TurnState::RobotMoving(at) => self.robot_move(at).await,
            TurnState::CheckEnd(side) => self.check_end(side),
            finished @ TurnState::Finished(_) => finished,
        };
        &self.state
    }

    async fn start(&mut self) -> TurnState {
        if let Err(e) = self.sequencer.return_home().await {
            return self.fault(e).await;
        }

        let board = match self.perception.read_board().await {
            Ok(board) => board,
            Err(e) => {
                warn!(error = %e, "Failed to analyze initial board state");
                return TurnState::Finished(GameOutcome::Aborted(AbortReason::InitialScanFailed));
            }
        };

        if !board.is_clear() {
            warn!(%board, "Board does not appear to be empty");
            self.operator.say(&board.display());
            if !self.operator.confirm("Continue anyway?").await {
                return TurnState::Finished(GameOutcome::Aborted(AbortReason::BoardNotEmpty));
            }
            self.session.adopt_board(board);
        }

        info!("Waiting for player to make first move");
        TurnState::AwaitingPlayerMove
    }

    /// Polls perception until a new player mark appears or the timeout passes.
    ///
    /// Only the first new player mark, row-major, counts. Failed reads are
    /// treated as "no move yet".
    #[instrument(skip(self), fields(poll = ?self.config.poll_interval(), timeout = ?self.config.timeout()))]
    async fn wait_for_player_move(&mut self) -> Option<Move> {
        let snapshot = *self.session.board();
        let deadline = Instant::now() + self.config.timeout();

        loop {
            match tokio::time::timeout_at(deadline, self.perception.read_board()).await {
                Err(_) => return None,
                Ok(Ok(board)) => {
                    if let Some(at) = snapshot.first_new_mark(&board, Side::Player) {
                        info!(row = at.row(), col = at.col(), "Detected player move");
                        return Some(at);
                    }
                    debug!("No valid player move detected");
                }
                Ok(Err(e)) => debug!(error = %e, "Board read failed, treating as no move"),
            }

            tokio::time::sleep(self.config.poll_interval()).await;
            if Instant::now() >= deadline {
                return None;
            }
        }
    }

    fn accept_player_move(&mut self, at: Move) -> TurnState {
        let Some(slot) = self.session.allocate_slot(Side::Player) else {
            warn!(row = at.row(), col = at.col(), "Player piece appeared with player storage empty");
            return TurnState::Finished(GameOutcome::Aborted(AbortReason::PlayerOutOfPieces));
        };
        debug!(%slot, "Player slot used");
        if let Err(e) = self.session.commit(Side::Player, at) {
            // The cell came from a diff against our own board, so it is empty.
            error!(error = %e, "Player move rejected");
            return TurnState::AwaitingPlayerMove;
        }
        self.operator.say(&self.session.board().display());
        TurnState::CheckEnd(Side::Player)
    }

    async fn robot_move(&mut self, at: Move) -> TurnState {
        let poses = self.poses;
        let slot = match self.session.allocate_slot(Side::Robot) {
            Some(slot) => slot,
            None => {
                warn!("Robot couldn't complete move - out of pieces");
                return TurnState::Finished(GameOutcome::Aborted(AbortReason::RobotOutOfPieces));
            }
        };
        let Some(slot_pose) = poses.storage_slot(Side::Robot, slot.index()) else {
            warn!(%slot, "No pose for storage slot");
            return TurnState::Finished(GameOutcome::Aborted(AbortReason::RobotOutOfPieces));
        };

        info!(%slot, row = at.row(), col = at.col(), "Picking up robot piece");
        let motion = async {
            self.sequencer.pick(slot_pose).await?;
            self.sequencer.place(poses.cell(at)).await?;
            self.sequencer.return_home().await
        };
        if let Err(e) = motion.await {
            return self.fault(e).await;
        }

        match self.session.commit(Side::Robot, at) {
            Ok(()) => {
                self.operator.say(&self.session.board().display());
                TurnState::CheckEnd(Side::Robot)
            }
            Err(e) => {
                error!(error = %e, "Robot move rejected");
                TurnState::Finished(GameOutcome::Aborted(AbortReason::ActuatorFault(e.to_string())))
            }
        }
    }

    fn check_end(&self, side: Side) -> TurnState {
        let board = self.session.board();
        if check_win(board, side) {
            TurnState::Finished(GameOutcome::win_for(side))
        } else if check_draw(board) {
            TurnState::Finished(GameOutcome::Draw)
        } else {
            match side {
                Side::Player => TurnState::RobotThinking,
                Side::Robot => TurnState::AwaitingPlayerMove,
            }
        }
    }

    async fn fault(&mut self, err: ActuatorError) -> TurnState {
        error!(error = %err, "Actuator fault, returning home");
        if let Err(home_err) = self.sequencer.return_home().await {
            warn!(error = %home_err, "Return home after fault also failed");
        }
        TurnState::Finished(GameOutcome::Aborted(AbortReason::ActuatorFault(err.message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_setters_and_defaults() {
        let config = GameConfig::default().with_timeout_ms(10_000);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TurnState::PlayerMoved(Move::CENTER).to_string(), "player moved (1, 1)");
        assert_eq!(
            TurnState::Finished(GameOutcome::Draw).to_string(),
            "finished: It's a draw!"
        );
    }
}
