//! tictacarm library - a servo arm that plays tic-tac-toe and sorts cubes
//!
//! # Architecture
//!
//! - **Actuator**: joint angle commands to the servo driver (or a simulation)
//! - **Motion**: poses, smooth moves, pick and place sequences
//! - **Perception**: camera capture and a vision model that reads the board
//! - **Orchestrator**: the turn loop of one game against a human
//! - **Sorting**: a second arm that drops black and aqua cubes into bins
//!
//! # Example
//!
//! ```no_run
//! use tictacarm::{ArmConfig, ScriptedOperator, ScriptedPerception, SimulatedActuator, GameOrchestrator};
//! use tictacarm_rules::Board;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ArmConfig::default();
//! let actuator = SimulatedActuator::new();
//! let perception = ScriptedPerception::boards([Board::default()]);
//! let operator = ScriptedOperator::new(["y"]);
//! let mut game = GameOrchestrator::new(
//!     &perception,
//!     config.sequencer(&actuator),
//!     config.poses(),
//!     &operator,
//!     config.game().clone(),
//!     rand::thread_rng(),
//! );
//! let report = game.play().await;
//! println!("{}", report.outcome);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod actuator;
mod config;
mod credentials;
mod inventory;
mod motion;
mod operator;
mod orchestrator;
mod perception;
mod rig;
mod session;
mod sorting;

// Crate-level exports - Actuation
pub use actuator::{
    Actuator, ActuatorError, Joint, JointMap, ProcessActuator, ServoBridgeConfig, SimulatedActuator,
};

// Crate-level exports - Configuration
pub use config::{ArmConfig, ConfigError};
pub use credentials::resolve_api_key;

// Crate-level exports - Motion
pub use motion::{
    CalibrationConfig, GripperConfig, JointSweep, MotionCommand, MotionPlan, MotionProfile,
    MotionSequencer, Pose, PoseCatalog,
};

// Crate-level exports - Perception
pub use perception::{
    BOARD_PROMPT, BoardPerception, Camera, CameraSettings, CommandCamera, Frame, PerceptionError,
    ScriptedPerception, StillImageCamera, VisionBoardReader, VisionClient, VisionConfig,
    VisionError, VisionProvider, VisionSettings, parse_board_reply,
};

// Crate-level exports - Game loop
pub use inventory::{PieceInventory, SlotId};
pub use operator::{ConsoleOperator, Operator, ScriptedOperator};
pub use orchestrator::{GameConfig, GameOrchestrator, GameReport, TurnState};
pub use rig::{Rig, until_interrupted};
pub use session::{AbortReason, GameOutcome, SessionState};

// Crate-level exports - Cube sorting
pub use sorting::{
    ColorCalibration, CommandDetector, CubeColor, DetectedObject, Hsv, HsvRange, ObjectDetector,
    ScriptedDetector, SortOutcome, SortStats, SortingConfig, SortingStation, largest,
    load_roi_samples,
};
