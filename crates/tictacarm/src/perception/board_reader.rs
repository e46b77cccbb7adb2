//! Camera plus vision model as a [`BoardPerception`].

use super::{BoardPerception, Camera, Frame, PerceptionError, VisionClient};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tictacarm_rules::Board;
use tracing::{debug, info, instrument, warn};

/// Instruction sent with every board image.
pub const BOARD_PROMPT: &str = "This is a tic-tac-toe board with red and blue blocks. \
Red blocks are the robot's pieces, blue blocks are the player's pieces. \
Please analyze the image and return the exact positions of all blocks on the board in JSON format. \
The format should be a 3x3 grid where 0 = empty, 1 = blue (player), 2 = red (robot). \
For example: [[0,1,0],[0,2,0],[1,0,0]] would mean blue blocks at top-middle and bottom-left, \
and a red block in the middle center.";

static GRID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\[.*?\]\s*\]").expect("valid regex"));

/// Extracts and validates the 3x3 grid embedded in a free-text reply.
///
/// The lazy match stops at the first `]` followed by `]`, so the grid has
/// to be written without nested brackets beyond its rows, as requested.
#[instrument(skip(reply), fields(reply_length = reply.len()))]
pub fn parse_board_reply(reply: &str) -> Result<Board, PerceptionError> {
    let grid = GRID
        .find(reply)
        .ok_or_else(|| PerceptionError::new(format!("no board grid in reply: {}", reply)))?;
    debug!(grid = grid.as_str(), "Detected board state");

    let rows: Vec<Vec<u8>> = serde_json::from_str(grid.as_str())
        .map_err(|e| PerceptionError::new(format!("grid is not JSON: {}", e)))?;
    Board::try_from(rows).map_err(|e| PerceptionError::new(e.to_string()))
}

/// Reads the board by photographing it and asking the vision model.
pub struct VisionBoardReader {
    camera: Arc<dyn Camera>,
    client: VisionClient,
}

impl VisionBoardReader {
    /// Creates a reader.
    pub fn new(camera: Arc<dyn Camera>, client: VisionClient) -> Self {
        Self { camera, client }
    }
}

#[async_trait::async_trait]
impl BoardPerception for VisionBoardReader {
    async fn capture_board_image(&self) -> Result<Frame, PerceptionError> {
        self.camera.capture().await
    }

    #[instrument(skip(self, frame), fields(camera = self.camera.name()))]
    async fn analyze_board(&self, frame: &Frame) -> Result<Board, PerceptionError> {
        let reply = self.client.describe_image(BOARD_PROMPT, frame.jpeg()).await?;
        match parse_board_reply(&reply) {
            Ok(board) => {
                info!(%board, "Board analyzed");
                Ok(board)
            }
            Err(e) => {
                warn!(%reply, "Could not extract board state from reply");
                Err(e)
            }
        }
    }
}
