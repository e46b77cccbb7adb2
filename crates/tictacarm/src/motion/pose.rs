//! Named joint targets and the pose catalog of the tic-tac-toe rig.

use crate::actuator::Joint;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tictacarm_rules::{Move, Side};

/// A named set of joint targets in degrees.
///
/// Joints left as `None` are not touched when moving to the pose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Name used in logs. Filled in by the catalog when left blank.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Base rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f32>,
    /// Shoulder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoulder: Option<f32>,
    /// Elbow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elbow: Option<f32>,
    /// Wrist pitch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrist_pitch: Option<f32>,
    /// Wrist roll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrist_roll: Option<f32>,
    /// Claw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claw: Option<f32>,
}

impl Pose {
    /// Creates an empty pose.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Five-joint arm pose; the claw is left alone.
    pub fn arm(
        name: impl Into<String>,
        base: f32,
        shoulder: f32,
        elbow: f32,
        wrist_pitch: f32,
        wrist_roll: f32,
    ) -> Self {
        Self::named(name)
            .with(Joint::Base, base)
            .with(Joint::Shoulder, shoulder)
            .with(Joint::Elbow, elbow)
            .with(Joint::WristPitch, wrist_pitch)
            .with(Joint::WristRoll, wrist_roll)
    }

    /// Returns the pose with `joint` targeted at `degrees`.
    pub fn with(mut self, joint: Joint, degrees: f32) -> Self {
        *self.slot(joint) = Some(degrees);
        self
    }

    /// Target for `joint`, if named.
    pub fn target(&self, joint: Joint) -> Option<f32> {
        match joint {
            Joint::Base => self.base,
            Joint::Shoulder => self.shoulder,
            Joint::Elbow => self.elbow,
            Joint::WristPitch => self.wrist_pitch,
            Joint::WristRoll => self.wrist_roll,
            Joint::Claw => self.claw,
        }
    }

    /// Named targets in joint order.
    pub fn targets(&self) -> Vec<(Joint, f32)> {
        Joint::iter()
            .filter_map(|joint| self.target(joint).map(|deg| (joint, deg)))
            .collect()
    }

    fn slot(&mut self, joint: Joint) -> &mut Option<f32> {
        match joint {
            Joint::Base => &mut self.base,
            Joint::Shoulder => &mut self.shoulder,
            Joint::Elbow => &mut self.elbow,
            Joint::WristPitch => &mut self.wrist_pitch,
            Joint::WristRoll => &mut self.wrist_roll,
            Joint::Claw => &mut self.claw,
        }
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .targets()
            .iter()
            .map(|(joint, deg)| format!("{}={}", joint, deg))
            .collect();
        write!(f, "{} {{{}}}", self.name, parts.join(", "))
    }
}

/// Every calibrated pose of the tic-tac-toe arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseCatalog {
    /// Rest pose between actions.
    pub home: Pose,
    /// Board cells, indexed `[row][col]`.
    pub board: [[Pose; 3]; 3],
    /// Storage slots holding the player's (blue) pieces.
    pub player_storage: Vec<Pose>,
    /// Storage slots holding the robot's (red) pieces.
    pub robot_storage: Vec<Pose>,
}

impl PoseCatalog {
    /// Pose above a board cell.
    pub fn cell(&self, at: Move) -> &Pose {
        &self.board[at.row()][at.col()]
    }

    /// Storage slots for `side`.
    pub fn storage(&self, side: Side) -> &[Pose] {
        match side {
            Side::Player => &self.player_storage,
            Side::Robot => &self.robot_storage,
        }
    }

    /// Storage slot `index` (0-based) for `side`.
    pub fn storage_slot(&self, side: Side, index: usize) -> Option<&Pose> {
        self.storage(side).get(index)
    }

    /// Gives every unnamed pose a name derived from its place in the catalog.
    pub fn fill_names(&mut self) {
        if self.home.name.is_empty() {
            self.home.name = "home".into();
        }
        for at in Move::ALL {
            let pose = &mut self.board[at.row()][at.col()];
            if pose.name.is_empty() {
                pose.name = format!("cell {}", at);
            }
        }
        for (side, slots) in [
            (Side::Player, &mut self.player_storage),
            (Side::Robot, &mut self.robot_storage),
        ] {
            for (i, pose) in slots.iter_mut().enumerate() {
                if pose.name.is_empty() {
                    pose.name = format!("{} storage #{}", side, i + 1);
                }
            }
        }
    }
}

impl Default for PoseCatalog {
    fn default() -> Self {
        let board = [0usize, 1, 2].map(|row| {
            [0usize, 1, 2].map(|col| {
                let base = 30.0 + 30.0 * row as f32;
                let shoulder = 90.0 + 10.0 * col as f32;
                Pose::arm(format!("cell ({}, {})", row, col), base, shoulder, 45.0, 0.0, 90.0)
            })
        });
        let storage = |side: Side, base: f32| -> Vec<Pose> {
            (0..5)
                .map(|i| {
                    let shoulder = 80.0 + 10.0 * i as f32;
                    Pose::arm(format!("{} storage #{}", side, i + 1), base, shoulder, 45.0, 0.0, 90.0)
                })
                .collect()
        };
        Self {
            home: Pose::arm("home", 120.0, 45.0, 90.0, 0.0, 90.0),
            board,
            player_storage: storage(Side::Player, 150.0),
            robot_storage: storage(Side::Robot, 180.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_skip_unnamed_joints() {
        let pose = Pose::named("pickup")
            .with(Joint::Claw, 40.0)
            .with(Joint::Base, 15.0);
        assert_eq!(pose.targets(), vec![(Joint::Base, 15.0), (Joint::Claw, 40.0)]);
        assert_eq!(pose.target(Joint::Elbow), None);
    }

    #[test]
    fn test_default_catalog_values() {
        let catalog = PoseCatalog::default();
        assert_eq!(catalog.home.target(Joint::Base), Some(120.0));
        assert_eq!(catalog.cell(Move::at(0, 0)).target(Joint::Shoulder), Some(90.0));
        assert_eq!(catalog.cell(Move::at(2, 2)).target(Joint::Base), Some(90.0));
        assert_eq!(catalog.cell(Move::at(1, 2)).target(Joint::Shoulder), Some(110.0));
        assert_eq!(catalog.storage(Side::Player).len(), 5);
        assert_eq!(
            catalog.storage_slot(Side::Robot, 4).and_then(|p| p.target(Joint::Shoulder)),
            Some(120.0)
        );
        assert_eq!(catalog.storage_slot(Side::Robot, 0).and_then(|p| p.base), Some(180.0));
    }

    #[test]
    fn test_fill_names_after_partial_load() {
        let mut catalog: PoseCatalog = toml::from_str(
            r#"
            player_storage = [{ base = 150.0, shoulder = 80.0 }]
            [home]
            base = 100.0
            "#,
        )
        .unwrap();
        catalog.fill_names();
        assert_eq!(catalog.home.name, "home");
        assert_eq!(catalog.home.target(Joint::Shoulder), None);
        assert_eq!(catalog.player_storage[0].name, "Player storage #1");
        // Board falls back to defaults when absent.
        assert_eq!(catalog.cell(Move::CENTER).target(Joint::Base), Some(60.0));
    }
}
