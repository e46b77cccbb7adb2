//! Core domain types: cells, sides and the board.

use crate::position::Move;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Which side a mark belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The human opponent (blue pieces).
    Player,
    /// The arm (red pieces).
    Robot,
}

impl Side {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::Player => Side::Robot,
            Side::Robot => Side::Player,
        }
    }

    /// The cell value this side leaves on the board.
    pub fn mark(self) -> Cell {
        match self {
            Side::Player => Cell::Player,
            Side::Robot => Cell::Robot,
        }
    }
}

/// A single square of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// Nothing placed yet.
    #[default]
    Empty,
    /// Occupied by a player piece.
    Player,
    /// Occupied by a robot piece.
    Robot,
}

impl Cell {
    /// Numeric code used by the vision model: 0 empty, 1 player, 2 robot.
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Player => 1,
            Cell::Robot => 2,
        }
    }

    /// Parses a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::Player),
            2 => Some(Cell::Robot),
            _ => None,
        }
    }

    /// The side owning this cell, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::Player => Some(Side::Player),
            Cell::Robot => Some(Side::Robot),
        }
    }

    fn symbol(self) -> char {
        match self {
            Cell::Empty => ' ',
            Cell::Player => 'X',
            Cell::Robot => 'O',
        }
    }
}

/// Errors raised by board construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum BoardError {
    /// A coordinate fell outside `[0, 2]`.
    #[display("Coordinate ({}, {}) is off the board", row, col)]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// The target cell already holds a mark.
    #[display("Cell {} is already occupied", _0)]
    Occupied(Move),

    /// A perceived grid was not a 3x3 array of 0/1/2.
    #[display("Malformed grid: {}", _0)]
    MalformedGrid(String),
}

impl std::error::Error for BoardError {}

/// 3x3 game board.
///
/// Through the public API a cell only ever moves from [`Cell::Empty`] to a
/// mark. [`Board::clear`] is the single way back, used by a full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; 3]; 3],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from numeric rows (0 empty, 1 player, 2 robot).
    #[instrument]
    pub fn from_codes(rows: [[u8; 3]; 3]) -> Result<Self, BoardError> {
        let mut cells = [[Cell::Empty; 3]; 3];
        for (r, row) in rows.iter().enumerate() {
            for (c, code) in row.iter().enumerate() {
                cells[r][c] = Cell::from_code(*code).ok_or_else(|| {
                    BoardError::MalformedGrid(format!("value {} at ({}, {})", code, r, c))
                })?;
            }
        }
        Ok(Self { cells })
    }

    /// Numeric rows, the inverse of [`Board::from_codes`].
    pub fn to_codes(&self) -> [[u8; 3]; 3] {
        self.cells.map(|row| row.map(Cell::code))
    }

    /// Cell at the given coordinate.
    pub fn get(&self, at: Move) -> Cell {
        self.cells[at.row()][at.col()]
    }

    /// True if the cell holds no mark.
    pub fn is_empty(&self, at: Move) -> bool {
        self.get(at) == Cell::Empty
    }

    /// Places a mark on an empty cell.
    #[instrument(skip(self))]
    pub fn place(&mut self, at: Move, side: Side) -> Result<(), BoardError> {
        if !self.is_empty(at) {
            return Err(BoardError::Occupied(at));
        }
        self.cells[at.row()][at.col()] = side.mark();
        Ok(())
    }

    /// Resets every cell to empty.
    pub fn clear(&mut self) {
        self.cells = [[Cell::Empty; 3]; 3];
    }

    /// Rows of the board.
    pub fn rows(&self) -> &[[Cell; 3]; 3] {
        &self.cells
    }

    /// Empty cells in row-major order.
    pub fn empty_cells(&self) -> Vec<Move> {
        Move::ALL.into_iter().filter(|m| self.is_empty(*m)).collect()
    }

    /// True when no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c != Cell::Empty)
    }

    /// True when every cell is empty.
    pub fn is_clear(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c == Cell::Empty)
    }

    /// Number of marks `side` has on the board.
    pub fn count(&self, side: Side) -> usize {
        self.cells.iter().flatten().filter(|c| **c == side.mark()).count()
    }

    /// First cell, row-major, that is empty here but holds `side`'s mark in `later`.
    pub fn first_new_mark(&self, later: &Board, side: Side) -> Option<Move> {
        Move::ALL
            .into_iter()
            .find(|m| self.is_empty(*m) && later.get(*m) == side.mark())
    }

    /// Temporarily marks `at` for `side`, evaluates `eval`, then restores the cell.
    ///
    /// The restore runs from a drop guard, so the speculative mark never
    /// outlives this call even if `eval` unwinds.
    pub fn speculate<R>(&mut self, at: Move, side: Side, eval: impl FnOnce(&Board) -> R) -> R {
        let guard = Speculation::apply(self, at, side);
        eval(&*guard.board)
    }

    /// Multi-line rendering for logs and the console.
    pub fn display(&self) -> String {
        let mut out = String::from("-------------\n");
        for row in &self.cells {
            out.push('|');
            for cell in row {
                out.push(' ');
                out.push(cell.symbol());
                out.push_str(" |");
            }
            out.push_str("\n-------------\n");
        }
        out
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: Vec<String> = self
            .cells
            .iter()
            .map(|row| row.iter().map(|c| c.code().to_string()).collect::<Vec<_>>().join(","))
            .collect();
        write!(f, "[{}]", rows.join("|"))
    }
}

impl TryFrom<Vec<Vec<u8>>> for Board {
    type Error = BoardError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
            return Err(BoardError::MalformedGrid(format!(
                "expected 3x3, got {} rows",
                rows.len()
            )));
        }
        let mut codes = [[0u8; 3]; 3];
        for (r, row) in rows.iter().enumerate() {
            codes[r].copy_from_slice(row);
        }
        Board::from_codes(codes)
    }
}

/// Guard that undoes a speculative placement when dropped.
struct Speculation<'a> {
    board: &'a mut Board,
    at: Move,
    previous: Cell,
}

impl<'a> Speculation<'a> {
    fn apply(board: &'a mut Board, at: Move, side: Side) -> Self {
        let previous = board.get(at);
        board.cells[at.row()][at.col()] = side.mark();
        Self { board, at, previous }
    }
}

impl Drop for Speculation<'_> {
    fn drop(&mut self) {
        self.board.cells[self.at.row()][self.at.col()] = self.previous;
    }
}
