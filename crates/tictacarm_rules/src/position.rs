//! Board coordinates.

use crate::types::BoardError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A `(row, col)` coordinate on the board, both 0-indexed in `[0, 2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    row: usize,
    col: usize,
}

impl Move {
    /// The center cell.
    pub const CENTER: Move = Move::at(1, 1);

    /// The four corners, in row-major order.
    pub const CORNERS: [Move; 4] = [Move::at(0, 0), Move::at(0, 2), Move::at(2, 0), Move::at(2, 2)];

    /// The four edge midpoints, in row-major order.
    pub const EDGES: [Move; 4] = [Move::at(0, 1), Move::at(1, 0), Move::at(1, 2), Move::at(2, 1)];

    /// Every cell in row-major order.
    pub const ALL: [Move; 9] = [
        Move::at(0, 0),
        Move::at(0, 1),
        Move::at(0, 2),
        Move::at(1, 0),
        Move::at(1, 1),
        Move::at(1, 2),
        Move::at(2, 0),
        Move::at(2, 1),
        Move::at(2, 2),
    ];

    /// Creates a validated move.
    #[instrument]
    pub fn new(row: usize, col: usize) -> Result<Self, BoardError> {
        if row > 2 || col > 2 {
            return Err(BoardError::OutOfBounds { row, col });
        }
        Ok(Self { row, col })
    }

    /// Creates a move from constant coordinates.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is above 2. Intended for literals;
    /// use [`Move::new`] for anything that comes from outside.
    pub const fn at(row: usize, col: usize) -> Self {
        assert!(row <= 2 && col <= 2, "board coordinate out of range");
        Self { row, col }
    }

    /// Row, 0-2.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Column, 0-2.
    pub fn col(&self) -> usize {
        self.col
    }

    /// Row-major index, 0-8.
    pub fn index(&self) -> usize {
        self.row * 3 + self.col
    }

    /// Creates a move from a row-major index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable name of the cell.
    pub fn label(&self) -> &'static str {
        match (self.row, self.col) {
            (0, 0) => "Top-left",
            (0, 1) => "Top-center",
            (0, 2) => "Top-right",
            (1, 0) => "Middle-left",
            (1, 1) => "Center",
            (1, 2) => "Middle-right",
            (2, 0) => "Bottom-left",
            (2, 1) => "Bottom-center",
            _ => "Bottom-right",
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
