//! In-memory actuator used when no servo hardware is attached.

use super::{Actuator, ActuatorError, Joint};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct SimState {
    angles: BTreeMap<Joint, f32>,
    log: Vec<(Joint, f32)>,
    fail_after: Option<usize>,
}

/// Records every command and remembers the last angle per joint.
///
/// Starts with no known angles, like a freshly powered servo board.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    state: Mutex<SimState>,
}

impl SimulatedActuator {
    /// Creates a simulated arm with no known angles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a simulated arm that already sits at the given angles.
    pub fn with_angles(angles: impl IntoIterator<Item = (Joint, f32)>) -> Self {
        let sim = Self::new();
        sim.lock().angles.extend(angles);
        sim
    }

    /// Makes every command after the first `n` fail.
    pub fn fail_after(&self, n: usize) {
        self.lock().fail_after = Some(n);
    }

    /// Every command accepted so far, in order.
    pub fn commands(&self) -> Vec<(Joint, f32)> {
        self.lock().log.clone()
    }

    /// Number of commands accepted so far.
    pub fn command_count(&self) -> usize {
        self.lock().log.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Actuator for SimulatedActuator {
    #[instrument(skip(self))]
    async fn set_angle(&self, joint: Joint, degrees: f32) -> Result<(), ActuatorError> {
        let mut state = self.lock();
        if let Some(limit) = state.fail_after
            && state.log.len() >= limit
        {
            return Err(ActuatorError::new(format!(
                "simulated fault driving {} to {:.1}",
                joint, degrees
            )));
        }
        debug!(%joint, degrees, "Simulated servo move");
        state.angles.insert(joint, degrees);
        state.log.push((joint, degrees));
        Ok(())
    }

    async fn angle(&self, joint: Joint) -> Option<f32> {
        self.lock().angles.get(&joint).copied()
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
