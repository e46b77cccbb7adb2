//! Still-image capture.

use super::{Frame, PerceptionError};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Source of board images.
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    /// Captures one JPEG frame.
    async fn capture(&self) -> Result<Frame, PerceptionError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Camera section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Still-capture command writing a JPEG to stdout.
    command: Vec<String>,
    /// Capture timeout, in milliseconds.
    timeout_ms: u64,
    /// Directory to keep a copy of every capture in, if any.
    save_dir: Option<PathBuf>,
    /// Image served when no camera is available.
    fallback_image: PathBuf,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            command: [
                "rpicam-still", "-n", "-t", "1", "--width", "1024", "--height", "768", "-e", "jpg",
                "-o", "-",
            ]
            .map(String::from)
            .to_vec(),
            timeout_ms: 10_000,
            save_dir: None,
            fallback_image: PathBuf::from("test_board_image.jpg"),
        }
    }
}

/// Runs a still-capture program and reads the JPEG from its stdout.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    save_dir: Option<PathBuf>,
}

impl CommandCamera {
    /// Builds a camera from settings.
    ///
    /// Fails when the command is empty or the program is not on `PATH`.
    #[instrument(skip(settings), fields(command = ?settings.command()))]
    pub fn from_settings(settings: &CameraSettings) -> Result<Self, PerceptionError> {
        let (program, args) = settings
            .command()
            .split_first()
            .ok_or_else(|| PerceptionError::new("camera command is empty"))?;
        if !program_exists(program) {
            return Err(PerceptionError::new(format!("camera program {} not found", program)));
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: Duration::from_millis(*settings.timeout_ms()),
            save_dir: settings.save_dir().clone(),
        })
    }

    async fn save(&self, dir: &Path, jpeg: &[u8]) {
        let path = dir.join(format!("board_state_{}.jpg", chrono::Utc::now().timestamp()));
        match tokio::fs::write(&path, jpeg).await {
            Ok(()) => info!(path = %path.display(), "Image saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save image"),
        }
    }
}

#[async_trait::async_trait]
impl Camera for CommandCamera {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn capture(&self) -> Result<Frame, PerceptionError> {
        debug!("Capturing image of the board");
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| PerceptionError::new(format!("capture timed out after {:?}", self.timeout)))?
            .map_err(|e| PerceptionError::new(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(PerceptionError::new(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(PerceptionError::new("capture produced no image data"));
        }

        if let Some(dir) = &self.save_dir {
            self.save(dir, &output.stdout).await;
        }
        debug!(bytes = output.stdout.len(), "Image captured");
        Ok(Frame::new(output.stdout))
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Serves the same image file on every capture.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    /// Creates a camera reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Camera for StillImageCamera {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn capture(&self) -> Result<Frame, PerceptionError> {
        debug!("Camera not available, returning test image");
        let jpeg = tokio::fs::read(&self.path).await.map_err(|e| {
            PerceptionError::new(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(Frame::new(jpeg))
    }

    fn name(&self) -> &str {
        "still-image"
    }
}

/// True if `program` is a path to a file or can be found on `PATH`.
fn program_exists(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
