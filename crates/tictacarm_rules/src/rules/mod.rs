//! Game rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`](crate::Board) snapshot. Rules are kept
//! apart from board storage so the orchestrator can evaluate them against
//! perceived boards as well as the committed one.

pub mod draw;
pub mod strategy;
pub mod win;

pub use draw::check_draw;
pub use strategy::{choose_robot_move, finishing_move};
pub use win::{check_win, winner};
