//! Pick the largest cube from the pickup spot and drop it in its colour's bin.

use super::calibration::{ColorCalibration, CubeColor};
use super::detector::{ObjectDetector, largest};
use crate::actuator::{Actuator, ActuatorError, Joint, JointMap};
use crate::motion::{GripperConfig, MotionProfile, MotionSequencer, Pose};
use derive_getters::Getters;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Sorting section of the configuration file.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    /// Channel layout of the sorting arm.
    joints: JointMap,
    /// Smooth-move timing; `pause_ms` is the pause around grab and release.
    #[serde(deserialize_with = "sorting_profile")]
    profile: MotionProfile,
    /// Delay after each stage of a staged move, in milliseconds.
    stage_delay_ms: u64,
    /// Idle time after homing and between empty scans, in milliseconds.
    idle_ms: u64,
    /// Dwell at each stop of the test routine, in milliseconds.
    test_dwell_ms: u64,
    /// Claw angle when open.
    claw_open: f32,
    /// Claw angle when gripping a cube.
    claw_closed: f32,
    /// Shoulder angle that lowers the claw onto a cube.
    shoulder_lowered: f32,
    /// Shoulder angle for carrying.
    shoulder_raised: f32,
    /// Rest pose. The wrist servo is mounted inverted, so 180 is up.
    home: Pose,
    /// Scan and pickup pose.
    pickup: Pose,
    /// Drop pose for black cubes.
    black_bin: Pose,
    /// Drop pose for aqua cubes.
    aqua_bin: Pose,
    /// Colour calibration file.
    calibration_file: PathBuf,
    /// Detector helper command; the scripted detector is used when empty.
    detector_command: Vec<String>,
    /// Detector timeout, in milliseconds.
    detector_timeout_ms: u64,
    /// Detections at or below this area are ignored.
    min_area: u32,
}

impl Default for SortingConfig {
    fn default() -> Self {
        let bin = |name: &str, base: f32| {
            Pose::named(name)
                .with(Joint::Base, base)
                .with(Joint::Shoulder, 15.0)
                .with(Joint::Elbow, 5.0)
                .with(Joint::WristPitch, 125.0)
        };
        Self {
            joints: JointMap::sorting_arm(),
            profile: default_profile(),
            stage_delay_ms: 500,
            idle_ms: 1000,
            test_dwell_ms: 2000,
            claw_open: 40.0,
            claw_closed: 7.0,
            shoulder_lowered: 25.0,
            shoulder_raised: 15.0,
            home: Pose::named("home")
                .with(Joint::Base, 15.0)
                .with(Joint::Shoulder, 0.0)
                .with(Joint::Elbow, 0.0)
                .with(Joint::WristPitch, 180.0)
                .with(Joint::Claw, 40.0),
            pickup: bin("pickup", 15.0),
            black_bin: bin("black bin", 0.0),
            aqua_bin: bin("aqua bin", 45.0),
            calibration_file: PathBuf::from("color_calibration.txt"),
            detector_command: Vec::new(),
            detector_timeout_ms: 10_000,
            min_area: 500,
        }
    }
}

/// The sorting arm steps faster than the tic-tac-toe arm.
fn default_profile() -> MotionProfile {
    MotionProfile::new(10, 20, 1000, 500)
}

/// Fields given in `[sorting.profile]`.
#[derive(Deserialize)]
struct ProfileOverrides {
    steps: Option<u32>,
    step_delay_ms: Option<u64>,
    settle_ms: Option<u64>,
    pause_ms: Option<u64>,
}

/// Reads a partial profile, filling gaps from the sorting arm's timing.
fn sorting_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MotionProfile, D::Error> {
    let given = ProfileOverrides::deserialize(deserializer)?;
    let base = default_profile();
    Ok(MotionProfile::new(
        given.steps.unwrap_or(*base.steps()),
        given.step_delay_ms.unwrap_or(*base.step_delay_ms()),
        given.settle_ms.unwrap_or(*base.settle_ms()),
        given.pause_ms.unwrap_or(*base.pause_ms()),
    ))
}

impl SortingConfig {
    /// Drop pose for `color`.
    pub fn bin(&self, color: CubeColor) -> &Pose {
        match color {
            CubeColor::Black => &self.black_bin,
            CubeColor::Aqua => &self.aqua_bin,
        }
    }

    /// Delay after each stage of a staged move.
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    /// Idle time after homing and between empty scans.
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    /// Detector timeout.
    pub fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }
}

/// Running totals of sorted cubes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SortStats {
    /// Black cubes sorted.
    pub black: u32,
    /// Aqua cubes sorted.
    pub aqua: u32,
    /// All cubes sorted.
    pub total: u32,
}

impl SortStats {
    /// Counts one sorted cube.
    pub fn record(&mut self, color: CubeColor) {
        match color {
            CubeColor::Black => self.black += 1,
            CubeColor::Aqua => self.aqua += 1,
        }
        self.total += 1;
    }
}

impl std::fmt::Display for SortStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Black: {}, Aqua: {}, Total: {}", self.black, self.aqua, self.total)
    }
}

/// Result of one sorting cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    /// A cube of this colour was moved to its bin.
    Sorted(CubeColor),
    /// The scan found nothing to pick.
    NothingDetected,
}

/// The cube sorting station.
pub struct SortingStation<'a> {
    sequencer: MotionSequencer<'a>,
    detector: &'a dyn ObjectDetector,
    config: &'a SortingConfig,
    calibration: ColorCalibration,
    stats: SortStats,
}

impl<'a> SortingStation<'a> {
    /// Creates a station.
    pub fn new(
        actuator: &'a dyn Actuator,
        detector: &'a dyn ObjectDetector,
        config: &'a SortingConfig,
        calibration: ColorCalibration,
    ) -> Self {
        let gripper = GripperConfig::new(config.claw_open, config.claw_closed, 0.0);
        Self {
            sequencer: MotionSequencer::new(actuator, config.profile.clone(), gripper, config.home.clone()),
            detector,
            config,
            calibration,
            stats: SortStats::default(),
        }
    }

    /// Totals so far.
    pub fn stats(&self) -> SortStats {
        self.stats
    }

    /// Moves to `pose` in stages: base, shoulder with elbow, wrist, claw.
    ///
    /// Shoulder and elbow are driven concurrently when both are named.
    #[instrument(skip(self, pose), fields(pose = %pose.name))]
    pub async fn staged_move(&self, pose: &Pose) -> Result<(), ActuatorError> {
        let delay = self.config.stage_delay();

        if let Some(base) = pose.target(Joint::Base) {
            self.sequencer.smooth(Joint::Base, base).await?;
            sleep(delay).await;
        }

        match (pose.target(Joint::Shoulder), pose.target(Joint::Elbow)) {
            (Some(shoulder), Some(elbow)) => {
                let (s, e) = tokio::join!(
                    self.sequencer.smooth(Joint::Shoulder, shoulder),
                    self.sequencer.smooth(Joint::Elbow, elbow),
                );
                s?;
                e?;
                sleep(delay).await;
            }
            (Some(shoulder), None) => {
                self.sequencer.smooth(Joint::Shoulder, shoulder).await?;
                sleep(delay).await;
            }
            (None, Some(elbow)) => {
                self.sequencer.smooth(Joint::Elbow, elbow).await?;
                sleep(delay).await;
            }
            (None, None) => {}
        }

        if let Some(wrist) = pose.target(Joint::WristPitch) {
            self.sequencer.smooth(Joint::WristPitch, wrist).await?;
            sleep(delay).await;
        }

        if let Some(claw) = pose.target(Joint::Claw) {
            self.sequencer.smooth(Joint::Claw, claw).await?;
            sleep(delay).await;
        }
        Ok(())
    }

    /// Moves to the rest pose.
    pub async fn home(&self) -> Result<(), ActuatorError> {
        self.staged_move(&self.config.home).await
    }

    /// Closes the claw on a cube.
    pub async fn grab(&self) -> Result<(), ActuatorError> {
        self.sequencer.close_gripper().await?;
        sleep(self.config.profile.pause()).await;
        Ok(())
    }

    /// Opens the claw.
    pub async fn release(&self) -> Result<(), ActuatorError> {
        self.sequencer.open_gripper().await?;
        sleep(self.config.profile.pause()).await;
        Ok(())
    }

    async fn shoulder(&self, degrees: f32) -> Result<(), ActuatorError> {
        self.sequencer.smooth(Joint::Shoulder, degrees).await?;
        sleep(self.config.profile.pause()).await;
        Ok(())
    }

    /// Scans once and sorts the largest cube found.
    ///
    /// A detector failure counts as nothing detected.
    #[instrument(skip(self))]
    pub async fn sort_once(&mut self) -> Result<SortOutcome, ActuatorError> {
        let pause = self.config.profile.pause();
        info!("Looking for cubes");
        self.staged_move(&self.config.pickup).await?;
        sleep(self.config.idle()).await;

        let objects = match self.detector.detect_objects(&self.calibration).await {
            Ok(objects) => objects,
            Err(e) => {
                warn!(error = %e, "Detection failed");
                return Ok(SortOutcome::NothingDetected);
            }
        };
        let Some(target) = largest(&objects).copied() else {
            info!("No cubes detected");
            return Ok(SortOutcome::NothingDetected);
        };
        let color = *target.color();
        info!(%color, x = target.x(), y = target.y(), area = target.area(), "Detected cube");

        self.staged_move(&self.config.pickup).await?;
        sleep(pause).await;
        self.shoulder(self.config.shoulder_lowered).await?;
        self.grab().await?;
        sleep(pause).await;
        self.shoulder(self.config.shoulder_raised).await?;

        info!(%color, "Moving to bin");
        self.staged_move(self.config.bin(color)).await?;
        self.stats.record(color);

        self.shoulder(self.config.shoulder_lowered).await?;
        self.release().await?;
        sleep(pause).await;
        self.shoulder(self.config.shoulder_raised).await?;

        self.home().await?;
        sleep(self.config.idle()).await;
        Ok(SortOutcome::Sorted(color))
    }

    /// Sorts until `cycles` scans have run or `stop` is raised.
    ///
    /// Always tries to return home before reporting, even after a fault.
    #[instrument(skip(self, stop))]
    pub async fn run(&mut self, cycles: Option<usize>, stop: &AtomicBool) -> Result<SortStats, ActuatorError> {
        info!("Starting cube sorting system");
        let result = self.sort_loop(cycles, stop).await;

        info!("Cleaning up");
        if let Err(e) = self.home().await {
            warn!(error = %e, "Failed to return home during cleanup");
        }
        info!(stats = %self.stats, "Final stats");
        result.map(|()| self.stats)
    }

    async fn sort_loop(&mut self, cycles: Option<usize>, stop: &AtomicBool) -> Result<(), ActuatorError> {
        self.home().await?;
        sleep(self.config.idle()).await;

        let mut cycle = 0;
        loop {
            if stop.load(Ordering::SeqCst) {
                info!("Program stopped by user");
                return Ok(());
            }
            if cycles.is_some_and(|max| cycle >= max) {
                return Ok(());
            }
            cycle += 1;

            if self.sort_once().await? == SortOutcome::NothingDetected {
                sleep(self.config.idle()).await;
            }
        }
    }

    /// Visits home, both bins and pickup, then exercises the claw.
    #[instrument(skip(self))]
    pub async fn test_moves(&self) -> Result<(), ActuatorError> {
        let dwell = Duration::from_millis(self.config.test_dwell_ms);
        info!("Testing arm movements");
        self.home().await?;
        sleep(self.config.idle()).await;
        for pose in [&self.config.black_bin, &self.config.aqua_bin, &self.config.pickup] {
            info!(pose = %pose.name, "Moving to position");
            self.staged_move(pose).await?;
            sleep(dwell).await;
        }
        info!("Testing grab and release");
        self.grab().await?;
        sleep(self.config.idle()).await;
        self.release().await?;
        sleep(self.config.idle()).await;
        info!("Returning home");
        self.home().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedActuator;
    use crate::sorting::{DetectedObject, ScriptedDetector};

    #[tokio::test(start_paused = true)]
    async fn test_staged_move_orders_stages() {
        let sim = SimulatedActuator::new();
        let detector = ScriptedDetector::default();
        let config = SortingConfig::default();
        let station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());

        station.staged_move(&config.home).await.unwrap();
        let joints: Vec<Joint> = sim.commands().iter().map(|(j, _)| *j).collect();
        assert_eq!(joints.first(), Some(&Joint::Base));
        assert_eq!(joints.last(), Some(&Joint::Claw));
        let first_wrist = joints.iter().position(|j| *j == Joint::WristPitch).unwrap();
        assert!(joints[..first_wrist]
            .iter()
            .all(|j| matches!(j, Joint::Base | Joint::Shoulder | Joint::Elbow)));
        assert_eq!(sim.angle(Joint::WristPitch).await, Some(180.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shoulder_and_elbow_move_together() {
        let sim = SimulatedActuator::with_angles([(Joint::Shoulder, 0.0), (Joint::Elbow, 0.0)]);
        let detector = ScriptedDetector::default();
        let config = SortingConfig::default();
        let station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());
        let pose = Pose::named("reach")
            .with(Joint::Shoulder, 20.0)
            .with(Joint::Elbow, 30.0);

        station.staged_move(&pose).await.unwrap();

        let joints: Vec<Joint> = sim.commands().iter().map(|(j, _)| *j).collect();
        let steps = *config.profile.steps() as usize;
        assert_eq!(joints.len(), 2 * steps);
        let first_elbow = joints.iter().position(|j| *j == Joint::Elbow).unwrap();
        let last_shoulder = joints.iter().rposition(|j| *j == Joint::Shoulder).unwrap();
        assert!(first_elbow < last_shoulder, "moves ran one after the other: {:?}", joints);
        assert_eq!(sim.angle(Joint::Shoulder).await, Some(20.0));
        assert_eq!(sim.angle(Joint::Elbow).await, Some(30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_once_counts_largest_cube() {
        let sim = SimulatedActuator::new();
        let detector = ScriptedDetector::new([vec![
            DetectedObject::new(CubeColor::Black, 10, 10, 800),
            DetectedObject::new(CubeColor::Aqua, 50, 50, 2000),
        ]]);
        let config = SortingConfig::default();
        let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());

        assert_eq!(station.sort_once().await.unwrap(), SortOutcome::Sorted(CubeColor::Aqua));
        assert_eq!(station.stats(), SortStats { black: 0, aqua: 1, total: 1 });
        assert!(sim.commands().contains(&(Joint::Base, 45.0)));
        assert!(sim.commands().contains(&(Joint::Claw, 7.0)));
        assert_eq!(sim.angle(Joint::Claw).await, Some(40.0));

        assert_eq!(station.sort_once().await.unwrap(), SortOutcome::NothingDetected);
        assert_eq!(station.stats().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_once_lets_claw_settle_before_lifting() {
        let sim = SimulatedActuator::new();
        let detector = ScriptedDetector::new([vec![DetectedObject::new(CubeColor::Black, 1, 1, 900)]]);
        let config = SortingConfig::default();
        let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());

        let started = tokio::time::Instant::now();
        station.sort_once().await.unwrap();

        // Each smooth move is 10 steps of 20 ms and each stage adds 500 ms.
        // Pickup twice, bin and home: 3 + 3 + 3 + 4 stages of 700 ms.
        // Four shoulder moves, grab and release: 6 moves of 700 ms.
        // Two idles of 1 s, the pause before lowering and one settle
        // pause after each of grab and release: 1.5 s.
        let expected = Duration::from_millis(13 * 700 + 6 * 700 + 2 * 1000 + 3 * 500);
        let elapsed = started.elapsed();
        assert!(elapsed >= expected, "elapsed {:?}, expected {:?}", elapsed, expected);
        assert!(elapsed < expected + Duration::from_millis(100), "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_partial_profile_keeps_sorting_timing() {
        let config: SortingConfig = toml::from_str("[profile]\nsteps = 5\n").unwrap();
        assert_eq!(*config.profile().steps(), 5);
        assert_eq!(config.profile().step_delay(), Duration::from_millis(20));
        assert_eq!(config.profile().pause(), Duration::from_millis(500));

        let config: SortingConfig = toml::from_str("idle_ms = 10\n").unwrap();
        assert_eq!(config.profile(), SortingConfig::default().profile());
        assert_eq!(config.profile().step_delay(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_flag_raised() {
        let sim = SimulatedActuator::new();
        let detector = ScriptedDetector::default();
        let config = SortingConfig::default();
        let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());
        let stop = AtomicBool::new(true);
        let stats = station.run(None, &stop).await.unwrap();
        assert_eq!(stats, SortStats::default());
        assert_eq!(sim.angle(Joint::Base).await, Some(15.0));
    }
}
