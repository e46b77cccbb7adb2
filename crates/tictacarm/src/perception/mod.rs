//! Board perception: camera capture plus a vision model that reads the grid.

mod board_reader;
mod camera;
mod scripted;
mod vision_client;

pub use board_reader::{BOARD_PROMPT, VisionBoardReader, parse_board_reply};
pub use camera::{Camera, CameraSettings, CommandCamera, StillImageCamera};
pub use scripted::ScriptedPerception;
pub use vision_client::{VisionClient, VisionConfig, VisionError, VisionProvider, VisionSettings};

use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use tictacarm_rules::Board;
use tracing::{error, instrument};

/// A captured JPEG image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    jpeg: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wraps JPEG bytes captured now.
    pub fn new(jpeg: Vec<u8>) -> Self {
        Self {
            jpeg,
            captured_at: Utc::now(),
        }
    }

    /// Encoded image bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Capture time.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Perception adapter for the tic-tac-toe board.
///
/// Failures are recoverable; the orchestrator treats them as "no change".
#[async_trait::async_trait]
pub trait BoardPerception: Send + Sync {
    /// Captures an image of the board.
    async fn capture_board_image(&self) -> Result<Frame, PerceptionError>;

    /// Reads the grid from an image.
    async fn analyze_board(&self, frame: &Frame) -> Result<Board, PerceptionError>;

    /// Captures and analyzes in one step.
    #[instrument(skip(self))]
    async fn read_board(&self) -> Result<Board, PerceptionError> {
        let frame = self.capture_board_image().await?;
        self.analyze_board(&frame).await
    }
}

/// Capture, transport or parse failure while reading the board.
#[derive(Debug, Clone, Display, Error)]
#[display("Perception error: {} at {}:{}", message, file, line)]
pub struct PerceptionError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl PerceptionError {
    /// Creates a new perception error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Perception error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<VisionError> for PerceptionError {
    #[track_caller]
    fn from(err: VisionError) -> Self {
        Self::new(format!("vision model: {}", err.message))
    }
}
