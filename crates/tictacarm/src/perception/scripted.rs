//! Perception that replays a fixed list of readings.

use super::{BoardPerception, Frame, PerceptionError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tictacarm_rules::Board;
use tracing::debug;

/// Replays queued readings, then keeps returning the last good board.
///
/// Used by simulation mode and tests. A queued `Err` simulates a failed
/// capture or an unreadable reply.
#[derive(Debug, Default)]
pub struct ScriptedPerception {
    queue: Mutex<ScriptState>,
    reads: AtomicUsize,
}

#[derive(Debug, Default)]
struct ScriptState {
    pending: VecDeque<Result<Board, String>>,
    last: Board,
}

impl ScriptedPerception {
    /// Creates a script from readings, starting from an empty board.
    pub fn new(readings: impl IntoIterator<Item = Result<Board, String>>) -> Self {
        Self {
            queue: Mutex::new(ScriptState {
                pending: readings.into_iter().collect(),
                last: Board::new(),
            }),
            reads: AtomicUsize::new(0),
        }
    }

    /// Creates a script that only ever returns good boards.
    pub fn boards(boards: impl IntoIterator<Item = Board>) -> Self {
        Self::new(boards.into_iter().map(Ok))
    }

    /// Appends a reading.
    pub fn push(&self, reading: Result<Board, String>) {
        self.lock().pending.push_back(reading);
    }

    /// Number of reads served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl BoardPerception for ScriptedPerception {
    async fn capture_board_image(&self) -> Result<Frame, PerceptionError> {
        Ok(Frame::new(Vec::new()))
    }

    async fn analyze_board(&self, _frame: &Frame) -> Result<Board, PerceptionError> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.lock();
        match state.pending.pop_front() {
            Some(Ok(board)) => {
                debug!(read, %board, "Scripted reading");
                state.last = board;
                Ok(board)
            }
            Some(Err(message)) => Err(PerceptionError::new(message)),
            None => Ok(state.last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let b1 = Board::from_codes([[1, 0, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
        let script = ScriptedPerception::new([Ok(Board::new()), Err("glare".into()), Ok(b1)]);

        assert_eq!(script.read_board().await.unwrap(), Board::new());
        assert!(script.read_board().await.is_err());
        assert_eq!(script.read_board().await.unwrap(), b1);
        assert_eq!(script.read_board().await.unwrap(), b1);
        assert_eq!(script.reads(), 4);
    }
}
