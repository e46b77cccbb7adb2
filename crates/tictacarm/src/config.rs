//! Rig configuration loaded from TOML.

use crate::actuator::{Actuator, JointMap, ServoBridgeConfig};
use crate::motion::{CalibrationConfig, GripperConfig, MotionProfile, MotionSequencer, PoseCatalog};
use crate::orchestrator::GameConfig;
use crate::perception::{CameraSettings, VisionSettings};
use crate::sorting::SortingConfig;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Everything that describes one physical rig.
///
/// Every section is optional in the file; missing values fall back to the
/// calibration of the reference rig.
#[derive(Debug, Clone, Default, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Smooth-move timing.
    motion: MotionProfile,

    /// Claw angles and wrist dip.
    gripper: GripperConfig,

    /// Servo exercise routine.
    calibration: CalibrationConfig,

    /// Driver channel per joint.
    joints: JointMap,

    /// Calibrated poses of the tic-tac-toe arm.
    poses: PoseCatalog,

    /// Turn polling.
    game: GameConfig,

    /// Vision model.
    vision: VisionSettings,

    /// Board camera.
    camera: CameraSettings,

    /// Servo bridge helper; the simulated arm is used when absent.
    servo_bridge: Option<ServoBridgeConfig>,

    /// Cube sorting station.
    sorting: SortingConfig,
}

impl ArmConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!("Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.poses.fill_names();
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise the built-in defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!("No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Motion sequencer for the tic-tac-toe arm on `actuator`.
    pub fn sequencer<'a>(&self, actuator: &'a dyn Actuator) -> MotionSequencer<'a> {
        MotionSequencer::new(
            actuator,
            self.motion.clone(),
            self.gripper.clone(),
            self.poses.home.clone(),
        )
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Joint;
    use crate::perception::VisionProvider;
    use std::time::Duration;
    use tictacarm_rules::Move;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ArmConfig::from_toml("").unwrap();
        assert_eq!(*config.motion().steps(), 10);
        assert_eq!(*config.gripper().closed(), 90.0);
        assert_eq!(config.joints().channel(Joint::Claw), Some(5));
        assert!(config.servo_bridge().is_none());
        assert_eq!(config.game().poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = ArmConfig::from_toml(
            r#"
            [motion]
            step_delay_ms = 20

            [vision]
            provider = "anthropic"

            [servo_bridge]
            command = ["python3", "servo_bridge.py"]

            [poses.home]
            base = 100.0
            shoulder = 40.0
            "#,
        )
        .unwrap();
        assert_eq!(*config.motion().steps(), 10);
        assert_eq!(config.motion().step_delay(), Duration::from_millis(20));
        assert_eq!(*config.vision().provider(), VisionProvider::Anthropic);
        assert_eq!(config.servo_bridge().as_ref().map(|b| b.command().len()), Some(2));
        assert_eq!(config.poses().home.name, "home");
        assert_eq!(config.poses().home.target(Joint::Elbow), None);
        assert_eq!(config.poses().cell(Move::at(0, 0)).target(Joint::Base), Some(30.0));
    }

    #[test]
    fn test_sample_config_parses() {
        let config = ArmConfig::from_toml(include_str!("../../../arm_config.toml")).unwrap();
        let defaults = ArmConfig::default();
        assert_eq!(config.calibration(), defaults.calibration());
        assert_eq!(config.joints(), defaults.joints());
        assert_eq!(config.poses().home.target(Joint::WristRoll), Some(90.0));
        assert_eq!(config.sorting().pickup(), defaults.sorting().pickup());
        assert!(config.servo_bridge().is_some());
        assert!(config.sorting().detector_command().is_empty());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = ArmConfig::from_toml("[motion]\nsteps = \"many\"").unwrap_err();
        assert!(err.message.contains("Failed to parse config"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArmConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(*config.gripper().open(), 0.0);

        let path = dir.path().join("arm.toml");
        std::fs::write(&path, "[gripper]\nopen = 5.0\n").unwrap();
        let config = ArmConfig::load_or_default(&path).unwrap();
        assert_eq!(*config.gripper().open(), 5.0);
    }
}
