//! Cube sorting: a second arm that drops black and aqua cubes into bins.

mod calibration;
mod detector;
mod station;

pub use calibration::{ColorCalibration, CubeColor, Hsv, HsvRange, load_roi_samples};
pub use detector::{CommandDetector, DetectedObject, ObjectDetector, ScriptedDetector, largest};
pub use station::{SortOutcome, SortStats, SortingConfig, SortingStation};
