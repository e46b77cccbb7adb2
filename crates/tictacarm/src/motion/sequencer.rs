//! Turns poses and pick/place actions into timed joint commands.

use super::{CalibrationConfig, GripperConfig, MotionCommand, MotionPlan, MotionProfile, Pose, PoseCatalog};
use crate::actuator::{Actuator, ActuatorError, Joint};
use tictacarm_rules::Side;
use tracing::{debug, info, instrument};

/// Open-loop motion sequencer for one arm.
///
/// Every operation returns once the last command has been sent; arrival is
/// never checked.
pub struct MotionSequencer<'a> {
    actuator: &'a dyn Actuator,
    profile: MotionProfile,
    gripper: GripperConfig,
    home: Pose,
}

impl<'a> MotionSequencer<'a> {
    /// Creates a sequencer driving `actuator`.
    pub fn new(
        actuator: &'a dyn Actuator,
        profile: MotionProfile,
        gripper: GripperConfig,
        home: Pose,
    ) -> Self {
        Self {
            actuator,
            profile,
            gripper,
            home,
        }
    }

    /// The actuator being driven.
    pub fn actuator(&self) -> &'a dyn Actuator {
        self.actuator
    }

    /// Timing profile in use.
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Plan for moving to `pose`.
    ///
    /// Smooth moves interpolate each named joint in turn. Direct moves set
    /// every joint at once and then wait for the arm to settle.
    pub fn plan_move_to(&self, pose: &Pose, smooth: bool) -> MotionPlan {
        let mut plan = MotionPlan::new();
        for (joint, target) in pose.targets() {
            if smooth {
                plan.push(MotionCommand::Smooth { joint, target });
            } else {
                plan.push(MotionCommand::Set { joint, target });
            }
        }
        if !smooth {
            plan.wait(self.profile.settle());
        }
        plan
    }

    /// Plan for picking a piece from the storage slot at `slot_pose`.
    pub async fn plan_pick(&self, slot_pose: &Pose) -> MotionPlan {
        let wrist = self.wrist_base(slot_pose).await;
        let pause = self.profile.pause();

        let mut plan = self.plan_move_to(slot_pose, true);
        plan.smooth(Joint::Claw, *self.gripper.open());
        plan.wait(pause);
        plan.smooth(Joint::WristPitch, wrist + self.gripper.wrist_offset());
        plan.wait(pause);
        plan.smooth(Joint::Claw, *self.gripper.closed());
        plan.wait(pause);
        plan.smooth(Joint::WristPitch, wrist);
        plan.wait(pause);
        plan
    }

    /// Plan for placing the held piece on the cell at `cell_pose`.
    pub async fn plan_place(&self, cell_pose: &Pose) -> MotionPlan {
        let wrist = self.wrist_base(cell_pose).await;
        let pause = self.profile.pause();

        let mut plan = self.plan_move_to(cell_pose, true);
        plan.smooth(Joint::WristPitch, wrist + self.gripper.wrist_offset());
        plan.wait(pause);
        plan.smooth(Joint::Claw, *self.gripper.open());
        plan.wait(pause);
        plan.smooth(Joint::WristPitch, wrist);
        plan.wait(pause);
        plan
    }

    /// Plan for the servo exercise routine.
    pub fn plan_calibration_sweep(&self, calibration: &CalibrationConfig) -> MotionPlan {
        let dwell = calibration.dwell();
        let mut plan = MotionPlan::new();
        for sweep in calibration.sweep() {
            for angle in &sweep.angles {
                plan.smooth(sweep.joint, *angle);
                plan.wait(dwell);
            }
        }
        plan.smooth(Joint::Claw, *self.gripper.open());
        plan.wait(dwell);
        plan.smooth(Joint::Claw, *self.gripper.closed());
        plan.wait(dwell);
        plan.append(self.plan_move_to(&self.home, true));
        plan
    }

    /// Wrist angle a dip is measured from.
    async fn wrist_base(&self, pose: &Pose) -> f32 {
        match pose.target(Joint::WristPitch) {
            Some(angle) => angle,
            None => self.actuator.angle(Joint::WristPitch).await.unwrap_or(0.0),
        }
    }

    /// Runs `plan` in order. The first actuator error aborts the rest.
    #[instrument(skip(self, plan), fields(commands = plan.len(), actuator = self.actuator.name()))]
    pub async fn execute(&self, plan: MotionPlan) -> Result<(), ActuatorError> {
        for command in plan {
            match command {
                MotionCommand::Smooth { joint, target } => self.smooth(joint, target).await?,
                MotionCommand::Set { joint, target } => self.set(joint, target).await?,
                MotionCommand::Wait(duration) => tokio::time::sleep(duration).await,
            }
        }
        Ok(())
    }

    /// Interpolates `joint` to `target` over the profile's steps.
    ///
    /// Starts from the last known angle, or from the target when none is
    /// known. The final step always lands exactly on `target`.
    pub async fn smooth(&self, joint: Joint, target: f32) -> Result<(), ActuatorError> {
        let steps = (*self.profile.steps()).max(1);
        let start = self.actuator.angle(joint).await.unwrap_or(target);
        let step = (target - start) / steps as f32;
        let delay = self.profile.step_delay();

        for i in 1..=steps {
            let angle = if i == steps { target } else { start + step * i as f32 };
            self.actuator.set_angle(joint, angle).await?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Commands `joint` to `target` in one step.
    pub async fn set(&self, joint: Joint, target: f32) -> Result<(), ActuatorError> {
        self.actuator.set_angle(joint, target).await
    }

    /// Moves every named joint of `pose` to its target.
    #[instrument(skip(self, pose), fields(pose = %pose.name))]
    pub async fn move_to(&self, pose: &Pose, smooth: bool) -> Result<(), ActuatorError> {
        debug!(%pose, "Moving arm");
        self.execute(self.plan_move_to(pose, smooth)).await?;
        debug!("Arm in position");
        Ok(())
    }

    /// Picks a piece from the storage slot at `slot_pose`.
    #[instrument(skip(self, slot_pose), fields(slot = %slot_pose.name))]
    pub async fn pick(&self, slot_pose: &Pose) -> Result<(), ActuatorError> {
        info!("Picking piece");
        let plan = self.plan_pick(slot_pose).await;
        self.execute(plan).await
    }

    /// Places the held piece on the cell at `cell_pose`.
    #[instrument(skip(self, cell_pose), fields(cell = %cell_pose.name))]
    pub async fn place(&self, cell_pose: &Pose) -> Result<(), ActuatorError> {
        info!("Placing piece");
        let plan = self.plan_place(cell_pose).await;
        self.execute(plan).await
    }

    /// Moves smoothly to the home pose.
    #[instrument(skip(self))]
    pub async fn return_home(&self) -> Result<(), ActuatorError> {
        debug!("Returning home");
        self.move_to(&self.home, true).await
    }

    /// Opens the claw.
    pub async fn open_gripper(&self) -> Result<(), ActuatorError> {
        debug!("Opening claw");
        self.smooth(Joint::Claw, *self.gripper.open()).await
    }

    /// Closes the claw.
    pub async fn close_gripper(&self) -> Result<(), ActuatorError> {
        debug!("Closing claw");
        self.smooth(Joint::Claw, *self.gripper.closed()).await
    }

    /// Exercises every joint, then the claw, then returns home.
    #[instrument(skip_all)]
    pub async fn calibration_sweep(&self, calibration: &CalibrationConfig) -> Result<(), ActuatorError> {
        info!("Starting servo calibration");
        self.execute(self.plan_calibration_sweep(calibration)).await?;
        info!("Servo calibration complete");
        Ok(())
    }

    /// Visits each pose with a dwell, then returns home.
    pub async fn tour(&self, poses: &[Pose], calibration: &CalibrationConfig) -> Result<(), ActuatorError> {
        for pose in poses {
            info!(pose = %pose.name, "Visiting position");
            self.move_to(pose, true).await?;
            tokio::time::sleep(calibration.dwell()).await;
        }
        self.return_home().await
    }

    /// Visits every storage slot of `side`, then returns home.
    #[instrument(skip(self, catalog, calibration))]
    pub async fn tour_storage(
        &self,
        catalog: &PoseCatalog,
        side: Side,
        calibration: &CalibrationConfig,
    ) -> Result<(), ActuatorError> {
        self.tour(catalog.storage(side), calibration).await
    }
}
