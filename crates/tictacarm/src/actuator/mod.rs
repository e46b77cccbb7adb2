//! Servo actuation.
//!
//! The arm is driven through the [`Actuator`] trait: "set joint to angle"
//! and "last known angle". Motion is open-loop, so an actuator reports
//! what it was last told rather than where the joint physically is.

mod bridge;
mod simulated;

pub use bridge::{ProcessActuator, ServoBridgeConfig};
pub use simulated::SimulatedActuator;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

/// A joint of the arm.
///
/// The declaration order is the order joints are driven when moving to a pose.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Joint {
    /// Base rotation.
    Base,
    /// Shoulder, up/down.
    Shoulder,
    /// Elbow, up/down.
    Elbow,
    /// Wrist pitch, up/down.
    WristPitch,
    /// Wrist roll.
    WristRoll,
    /// Gripper claw, open/close.
    Claw,
}

/// Driver channel assigned to each joint.
///
/// A joint without a channel is not wired on this arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointMap {
    base: Option<u8>,
    shoulder: Option<u8>,
    elbow: Option<u8>,
    wrist_pitch: Option<u8>,
    wrist_roll: Option<u8>,
    claw: Option<u8>,
}

impl JointMap {
    /// Channel layout of the sorting arm: no wrist roll, elbow and wrist on 8/9.
    pub fn sorting_arm() -> Self {
        Self {
            base: Some(0),
            shoulder: Some(1),
            elbow: Some(8),
            wrist_pitch: Some(9),
            wrist_roll: None,
            claw: Some(10),
        }
    }

    /// Channel for `joint`, if wired.
    pub fn channel(&self, joint: Joint) -> Option<u8> {
        match joint {
            Joint::Base => self.base,
            Joint::Shoulder => self.shoulder,
            Joint::Elbow => self.elbow,
            Joint::WristPitch => self.wrist_pitch,
            Joint::WristRoll => self.wrist_roll,
            Joint::Claw => self.claw,
        }
    }
}

impl Default for JointMap {
    /// Tic-tac-toe arm: six joints on channels 0-5.
    fn default() -> Self {
        Self {
            base: Some(0),
            shoulder: Some(1),
            elbow: Some(2),
            wrist_pitch: Some(3),
            wrist_roll: Some(4),
            claw: Some(5),
        }
    }
}

/// Servo collaborator.
///
/// Methods take `&self` so independent joints can be driven concurrently;
/// implementations keep their state behind a lock.
#[async_trait::async_trait]
pub trait Actuator: Send + Sync {
    /// Commands `joint` to `degrees`. Ranges are not checked here.
    async fn set_angle(&self, joint: Joint, degrees: f32) -> Result<(), ActuatorError>;

    /// Last angle commanded or reported for `joint`, if known.
    async fn angle(&self, joint: Joint) -> Option<f32>;

    /// Releases the underlying hardware.
    async fn release(&self) -> Result<(), ActuatorError> {
        Ok(())
    }

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Hardware-level fault reported by an actuator.
#[derive(Debug, Clone, Display, Error)]
#[display("Actuator error: {} at {}:{}", message, file, line)]
pub struct ActuatorError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ActuatorError {
    /// Creates a new actuator error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Actuator error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
