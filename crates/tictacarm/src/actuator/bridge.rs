//! Servo-bridge helper process.
//!
//! The PWM board is driven by a small helper (for example a Python
//! ServoKit shim) that reads `"<channel> <degrees>"` lines on stdin.

use super::{Actuator, ActuatorError, Joint, JointMap};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// How to launch the servo bridge.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServoBridgeConfig {
    /// Program and arguments.
    command: Vec<String>,

    /// How long to wait for the helper to exit after stdin closes.
    #[serde(default = "default_shutdown_timeout_ms")]
    shutdown_timeout_ms: u64,
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl ServoBridgeConfig {
    /// Creates a bridge config for the given command line.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

struct BridgeState {
    child: Child,
    stdin: Option<ChildStdin>,
    angles: BTreeMap<Joint, f32>,
}

/// Actuator that forwards commands to a servo-bridge process.
pub struct ProcessActuator {
    joints: JointMap,
    shutdown_timeout: Duration,
    state: Mutex<BridgeState>,
}

impl std::fmt::Debug for ProcessActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessActuator")
            .field("joints", &self.joints)
            .finish_non_exhaustive()
    }
}

impl ProcessActuator {
    /// Spawns the bridge helper.
    #[instrument(skip(config, joints), fields(command = ?config.command()))]
    pub fn spawn(config: &ServoBridgeConfig, joints: JointMap) -> Result<Self, ActuatorError> {
        let (program, args) = config
            .command()
            .split_first()
            .ok_or_else(|| ActuatorError::new("servo bridge command is empty"))?;

        info!(program = %program, args = ?args, "Starting servo bridge");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ActuatorError::new(format!("Failed to spawn {}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ActuatorError::new("Failed to capture servo bridge stdin"))?;

        Ok(Self {
            joints,
            shutdown_timeout: Duration::from_millis(*config.shutdown_timeout_ms()),
            state: Mutex::new(BridgeState {
                child,
                stdin: Some(stdin),
                angles: BTreeMap::new(),
            }),
        })
    }
}

#[async_trait::async_trait]
impl Actuator for ProcessActuator {
    #[instrument(skip(self))]
    async fn set_angle(&self, joint: Joint, degrees: f32) -> Result<(), ActuatorError> {
        let channel = self
            .joints
            .channel(joint)
            .ok_or_else(|| ActuatorError::new(format!("joint {} has no channel", joint)))?;

        let mut state = self.state.lock().await;
        let stdin = state
            .stdin
            .as_mut()
            .ok_or_else(|| ActuatorError::new("servo bridge already released"))?;

        let line = format!("{} {:.1}\n", channel, degrees);
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ActuatorError::new(format!("servo bridge write failed: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| ActuatorError::new(format!("servo bridge flush failed: {}", e)))?;

        debug!(channel, degrees, "Servo command sent");
        state.angles.insert(joint, degrees);
        Ok(())
    }

    async fn angle(&self, joint: Joint) -> Option<f32> {
        self.state.lock().await.angles.get(&joint).copied()
    }

    #[instrument(skip(self))]
    async fn release(&self) -> Result<(), ActuatorError> {
        let mut state = self.state.lock().await;
        // Closing stdin is the helper's signal to detach the servos and exit.
        drop(state.stdin.take());

        match tokio::time::timeout(self.shutdown_timeout, state.child.wait()).await {
            Ok(Ok(status)) => {
                info!(%status, "Servo bridge exited");
                Ok(())
            }
            Ok(Err(e)) => Err(ActuatorError::new(format!("servo bridge wait failed: {}", e))),
            Err(_) => {
                warn!("Servo bridge did not exit in time, killing it");
                state
                    .child
                    .kill()
                    .await
                    .map_err(|e| ActuatorError::new(format!("servo bridge kill failed: {}", e)))
            }
        }
    }

    fn name(&self) -> &str {
        "servo-bridge"
    }
}
