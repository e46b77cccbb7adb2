//! Motion planning and open-loop execution.
//!
//! High-level actions (move to a pose, pick, place) are first expanded
//! into a [`MotionPlan`] of [`MotionCommand`]s and then executed in order
//! against an [`Actuator`](crate::actuator::Actuator).

mod pose;
mod sequencer;

pub use pose::{Pose, PoseCatalog};
pub use sequencer::MotionSequencer;

use crate::actuator::Joint;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of a motion plan.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Interpolate from the last known angle to `target`.
    Smooth {
        /// Joint to move.
        joint: Joint,
        /// Final angle in degrees.
        target: f32,
    },
    /// Command `target` in one step.
    Set {
        /// Joint to move.
        joint: Joint,
        /// Angle in degrees.
        target: f32,
    },
    /// Sleep.
    Wait(Duration),
}

impl std::fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionCommand::Smooth { joint, target } => write!(f, "smooth {} -> {}", joint, target),
            MotionCommand::Set { joint, target } => write!(f, "set {} = {}", joint, target),
            MotionCommand::Wait(d) => write!(f, "wait {}ms", d.as_millis()),
        }
    }
}

/// Ordered list of motion commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionPlan {
    commands: Vec<MotionCommand>,
}

impl MotionPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: MotionCommand) {
        self.commands.push(command);
    }

    /// Appends a smooth move.
    pub fn smooth(&mut self, joint: Joint, target: f32) {
        self.push(MotionCommand::Smooth { joint, target });
    }

    /// Appends a wait.
    pub fn wait(&mut self, duration: Duration) {
        self.push(MotionCommand::Wait(duration));
    }

    /// Appends every command of `other`.
    pub fn append(&mut self, other: MotionPlan) {
        self.commands.extend(other.commands);
    }

    /// Commands in execution order.
    pub fn commands(&self) -> &[MotionCommand] {
        &self.commands
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if the plan does nothing.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sum of every explicit wait in the plan.
    pub fn total_wait(&self) -> Duration {
        self.commands
            .iter()
            .filter_map(|c| match c {
                MotionCommand::Wait(d) => Some(*d),
                _ => None,
            })
            .sum()
    }
}

impl IntoIterator for MotionPlan {
    type Item = MotionCommand;
    type IntoIter = std::vec::IntoIter<MotionCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Timing of smooth moves and the pauses between actions.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionProfile {
    /// Interpolation steps per smooth move.
    steps: u32,
    /// Sleep after each interpolation step, in milliseconds.
    step_delay_ms: u64,
    /// Settle time after a direct (non-smooth) pose move, in milliseconds.
    settle_ms: u64,
    /// Pause between pick/place stages, in milliseconds.
    pause_ms: u64,
}

impl MotionProfile {
    /// Creates a profile.
    pub fn new(steps: u32, step_delay_ms: u64, settle_ms: u64, pause_ms: u64) -> Self {
        Self {
            steps,
            step_delay_ms,
            settle_ms,
            pause_ms,
        }
    }

    /// Sleep after each interpolation step.
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Settle time after a direct pose move.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Pause between pick/place stages.
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::new(10, 50, 1000, 500)
    }
}

/// Claw angles and the wrist dip used to reach a piece.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperConfig {
    /// Claw angle when open.
    open: f32,
    /// Claw angle when closed on a piece.
    closed: f32,
    /// Degrees added to the wrist pitch to lower onto a piece.
    wrist_offset: f32,
}

impl GripperConfig {
    /// Creates a gripper config.
    pub fn new(open: f32, closed: f32, wrist_offset: f32) -> Self {
        Self {
            open,
            closed,
            wrist_offset,
        }
    }
}

impl Default for GripperConfig {
    fn default() -> Self {
        Self::new(0.0, 90.0, 30.0)
    }
}

/// Test angles for one joint during the calibration sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSweep {
    /// Joint under test.
    pub joint: Joint,
    /// Angles visited in order.
    pub angles: Vec<f32>,
}

impl JointSweep {
    /// Creates a sweep entry.
    pub fn new(joint: Joint, angles: impl Into<Vec<f32>>) -> Self {
        Self {
            joint,
            angles: angles.into(),
        }
    }
}

/// Servo exercise routine and the dwell used by position tours.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Arm joints exercised before the claw.
    sweep: Vec<JointSweep>,
    /// Wait after each sweep angle and tour stop, in milliseconds.
    dwell_ms: u64,
}

impl CalibrationConfig {
    /// Wait after each sweep angle and tour stop.
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sweep: vec![
                JointSweep::new(Joint::Base, [0.0, 180.0, 90.0]),
                JointSweep::new(Joint::Shoulder, [45.0, 90.0]),
                JointSweep::new(Joint::Elbow, [45.0, 90.0]),
                JointSweep::new(Joint::WristPitch, [0.0, 45.0]),
                JointSweep::new(Joint::WristRoll, [0.0, 90.0]),
            ],
            dwell_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_total_wait() {
        let mut plan = MotionPlan::new();
        plan.smooth(Joint::Base, 10.0);
        plan.wait(Duration::from_millis(500));
        plan.wait(Duration::from_secs(1));
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.total_wait(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_profile_keeps_defaults() {
        let profile: MotionProfile = toml::from_str("steps = 4").unwrap();
        assert_eq!(*profile.steps(), 4);
        assert_eq!(profile.step_delay(), Duration::from_millis(50));
        assert_eq!(profile.settle(), Duration::from_secs(1));
    }

    #[test]
    fn test_sweep_parses_joint_names() {
        let cal: CalibrationConfig = toml::from_str(
            r#"
            dwell_ms = 200
            [[sweep]]
            joint = "wrist_pitch"
            angles = [0.0, 30.0]
            "#,
        )
        .unwrap();
        assert_eq!(cal.sweep(), &vec![JointSweep::new(Joint::WristPitch, [0.0, 30.0])]);
        assert_eq!(cal.dwell(), Duration::from_millis(200));
    }
}
