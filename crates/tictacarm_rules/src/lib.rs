//! Tic-tac-toe rules for a robot opponent.
//!
//! This crate is pure decision logic over a 3x3 board: win and draw
//! detection plus the tiered move selection the robot plays with.
//! It performs no IO; randomness is injected by the caller.
//!
//! # Example
//!
//! ```
//! use rand::{rngs::StdRng, SeedableRng};
//! use tictacarm_rules::{Board, Move, Side, check_win, choose_robot_move};
//!
//! let mut board = Board::new();
//! board.place(Move::at(0, 0), Side::Robot).unwrap();
//! board.place(Move::at(1, 1), Side::Robot).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let mv = choose_robot_move(&board, &mut rng).unwrap();
//! assert_eq!(mv, Move::at(2, 2));
//!
//! board.place(mv, Side::Robot).unwrap();
//! assert!(check_win(&board, Side::Robot));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod position;
pub mod rules;
mod types;

pub use position::Move;
pub use rules::{check_draw, check_win, choose_robot_move, finishing_move, winner};
pub use types::{Board, BoardError, Cell, Side};
