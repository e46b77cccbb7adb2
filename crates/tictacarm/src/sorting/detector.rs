//! Cube detection collaborator.

use super::calibration::{ColorCalibration, CubeColor};
use crate::perception::PerceptionError;
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// A cube found in the camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct DetectedObject {
    /// Colour category.
    color: CubeColor,
    /// Image-space centre x.
    x: u32,
    /// Image-space centre y.
    y: u32,
    /// Bounding-box area in pixels.
    area: u32,
}

/// Largest object by area; the first one wins ties.
pub fn largest(objects: &[DetectedObject]) -> Option<&DetectedObject> {
    objects
        .iter()
        .reduce(|best, next| if next.area > best.area { next } else { best })
}

/// Finds cubes in the current camera view.
#[async_trait::async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Detects cubes using the given colour boxes.
    async fn detect_objects(
        &self,
        calibration: &ColorCalibration,
    ) -> Result<Vec<DetectedObject>, PerceptionError>;
}

/// Detector that replays queued detections, then sees nothing.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    frames: Mutex<VecDeque<Vec<DetectedObject>>>,
}

impl ScriptedDetector {
    /// Creates a detector returning each batch in turn.
    pub fn new(frames: impl IntoIterator<Item = Vec<DetectedObject>>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
        }
    }
}

#[async_trait::async_trait]
impl ObjectDetector for ScriptedDetector {
    async fn detect_objects(
        &self,
        _calibration: &ColorCalibration,
    ) -> Result<Vec<DetectedObject>, PerceptionError> {
        let next = self
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(next.unwrap_or_default())
    }
}

/// Runs a helper that prints a JSON array of detections.
///
/// The colour boxes are passed as `--black-lower h,s,v --black-upper ...
/// --aqua-lower ... --aqua-upper ...`. Objects smaller than `min_area` are
/// dropped.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    min_area: u32,
}

impl CommandDetector {
    /// Creates a detector from a command line.
    pub fn new(command: &[String], timeout: Duration, min_area: u32) -> Result<Self, PerceptionError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| PerceptionError::new("detector command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            min_area,
        })
    }

    fn bound_args(calibration: &ColorCalibration) -> Vec<String> {
        let black = calibration.range(CubeColor::Black);
        let aqua = calibration.range(CubeColor::Aqua);
        vec![
            "--black-lower".into(),
            black.lower.to_string(),
            "--black-upper".into(),
            black.upper.to_string(),
            "--aqua-lower".into(),
            aqua.lower.to_string(),
            "--aqua-upper".into(),
            aqua.upper.to_string(),
        ]
    }

    /// Parses helper output and drops objects below the area threshold.
    pub fn parse_output(&self, stdout: &[u8]) -> Result<Vec<DetectedObject>, PerceptionError> {
        let objects: Vec<DetectedObject> = serde_json::from_slice(stdout)
            .map_err(|e| PerceptionError::new(format!("detector output is not JSON: {}", e)))?;
        Ok(objects
            .into_iter()
            .filter(|o| o.area > self.min_area)
            .collect())
    }
}

#[async_trait::async_trait]
impl ObjectDetector for CommandDetector {
    #[instrument(skip(self, calibration), fields(program = %self.program))]
    async fn detect_objects(
        &self,
        calibration: &ColorCalibration,
    ) -> Result<Vec<DetectedObject>, PerceptionError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(Self::bound_args(calibration))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| PerceptionError::new("detector timed out"))?
            .map_err(|e| PerceptionError::new(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(PerceptionError::new(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        let objects = self.parse_output(&output.stdout)?;
        debug!(count = objects.len(), "Objects detected");
        Ok(objects)
    }
}
