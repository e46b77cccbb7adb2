//! Hardware handles for one run of the program.

use crate::actuator::{Actuator, JointMap, ProcessActuator, SimulatedActuator};
use crate::config::ArmConfig;
use crate::motion::{GripperConfig, MotionProfile, MotionSequencer, Pose};
use crate::perception::{Camera, CommandCamera, StillImageCamera};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The actuator and camera, opened once and released by [`Rig::shutdown`].
pub struct Rig {
    actuator: Box<dyn Actuator>,
    camera: Arc<dyn Camera>,
    released: bool,
}

impl Rig {
    /// Wraps already-opened hardware.
    pub fn new(actuator: Box<dyn Actuator>, camera: Arc<dyn Camera>) -> Self {
        Self {
            actuator,
            camera,
            released: false,
        }
    }

    /// Opens the hardware described by `config`, wired per `joints`.
    ///
    /// Anything that fails to start is replaced by its simulated stand-in
    /// with a warning; `simulate` skips the real hardware entirely.
    #[instrument(skip(config, joints))]
    pub fn start(config: &ArmConfig, joints: &JointMap, simulate: bool) -> Self {
        let actuator: Box<dyn Actuator> = match (simulate, config.servo_bridge()) {
            (false, Some(bridge)) => match ProcessActuator::spawn(bridge, joints.clone()) {
                Ok(actuator) => Box::new(actuator),
                Err(e) => {
                    warn!(error = %e, "Servo bridge unavailable, using simulated arm");
                    Box::new(SimulatedActuator::new())
                }
            },
            (false, None) => {
                warn!("No servo bridge configured, using simulated arm");
                Box::new(SimulatedActuator::new())
            }
            (true, _) => Box::new(SimulatedActuator::new()),
        };

        let fallback = || -> Arc<dyn Camera> {
            Arc::new(StillImageCamera::new(config.camera().fallback_image().clone()))
        };
        let camera = if simulate {
            fallback()
        } else {
            match CommandCamera::from_settings(config.camera()) {
                Ok(camera) => Arc::new(camera) as Arc<dyn Camera>,
                Err(e) => {
                    warn!(error = %e, "Camera unavailable, camera simulation mode will be used");
                    fallback()
                }
            }
        };

        info!(actuator = actuator.name(), camera = camera.name(), "Rig started");
        Self::new(actuator, camera)
    }

    /// The servo actuator.
    pub fn actuator(&self) -> &dyn Actuator {
        self.actuator.as_ref()
    }

    /// The board camera.
    pub fn camera(&self) -> Arc<dyn Camera> {
        Arc::clone(&self.camera)
    }

    /// Homes the arm and releases the actuator.
    ///
    /// Errors are logged, never returned: this runs on the way out.
    pub async fn shutdown(mut self, home: &Pose, profile: &MotionProfile) {
        self.release(home, profile).await;
    }

    /// Whether the hardware has been homed and released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    #[instrument(skip_all, fields(home = %home.name))]
    async fn release(&mut self, home: &Pose, profile: &MotionProfile) {
        if self.released {
            return;
        }
        let sequencer = MotionSequencer::new(
            self.actuator.as_ref(),
            profile.clone(),
            GripperConfig::default(),
            home.clone(),
        );
        match sequencer.return_home().await {
            Ok(()) => info!("Servos returned to home position"),
            Err(e) => warn!(error = %e, "Failed to return home during shutdown"),
        }
        if let Err(e) = self.actuator.release().await {
            warn!(error = %e, "Failed to release actuator");
        }
        self.released = true;
        info!("Hardware resources released");
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        if !self.released {
            warn!("Rig dropped without shutdown; arm was not homed");
        }
    }
}

/// Runs `work` until it finishes or `interrupt` fires.
///
/// `None` means the work was interrupted and dropped where it stood.
pub async fn until_interrupted<F, I>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => {
            info!("Interrupted, shutting down");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Joint;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_start_and_shutdown_homes() {
        let config = ArmConfig::default();
        let rig = Rig::start(&config, config.joints(), true);
        assert_eq!(rig.actuator().name(), "simulated");
        assert_eq!(rig.camera().name(), "still-image");
        rig.shutdown(&config.poses().home, config.motion()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_moves_shared_actuator_home() {
        let sim = Arc::new(SimulatedActuator::new());
        let rig = Rig::new(Box::new(SharedSim(Arc::clone(&sim))), Arc::new(StillImageCamera::new("x.jpg")));
        let home = Pose::named("home").with(Joint::Base, 120.0);
        rig.shutdown(&home, &MotionProfile::default()).await;
        assert_eq!(sim.angle(Joint::Base).await, Some(120.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_runs_once() {
        let sim = Arc::new(SimulatedActuator::new());
        let mut rig = Rig::new(Box::new(SharedSim(Arc::clone(&sim))), Arc::new(StillImageCamera::new("x.jpg")));
        let home = Pose::named("home").with(Joint::Base, 90.0);
        assert!(!rig.is_released());

        rig.release(&home, &MotionProfile::default()).await;
        assert!(rig.is_released());
        let homed = sim.command_count();
        assert!(homed > 0);

        rig.release(&home, &MotionProfile::default()).await;
        assert_eq!(sim.command_count(), homed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_work_and_shutdown_still_homes() {
        let sim = Arc::new(SimulatedActuator::new());
        let rig = Rig::new(Box::new(SharedSim(Arc::clone(&sim))), Arc::new(StillImageCamera::new("x.jpg")));
        let config = ArmConfig::default();

        let tour = async {
            config
                .sequencer(rig.actuator())
                .calibration_sweep(config.calibration())
                .await
        };
        let interrupt = tokio::time::sleep(std::time::Duration::from_millis(120));
        let result = until_interrupted(tour, interrupt).await;
        assert!(result.is_none());
        let stopped_at = sim.command_count();
        assert!(stopped_at > 0);

        rig.shutdown(&config.poses().home, config.motion()).await;
        assert!(sim.command_count() > stopped_at);
        assert_eq!(sim.angle(Joint::Base).await, config.poses().home.target(Joint::Base));
    }

    #[tokio::test]
    async fn test_finished_work_is_returned() {
        let result = until_interrupted(async { 7 }, std::future::pending::<()>()).await;
        assert_eq!(result, Some(7));
    }

    struct SharedSim(Arc<SimulatedActuator>);

    #[async_trait::async_trait]
    impl Actuator for SharedSim {
        async fn set_angle(&self, joint: Joint, degrees: f32) -> Result<(), crate::actuator::ActuatorError> {
            self.0.set_angle(joint, degrees).await
        }

        async fn angle(&self, joint: Joint) -> Option<f32> {
            self.0.angle(joint).await
        }

        fn name(&self) -> &str {
            "shared"
        }
    }
}
