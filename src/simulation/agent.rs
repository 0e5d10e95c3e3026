//! Simulated agent carrying the ground-truth pose.
//!
//! Uses the same motion and sensor models as the filter but its own random
//! stream, so its noise is independent of every particle's.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::common::{LocalizationResult, MotionCommand, Point2D, Pose2D};
use crate::localization::{MotionModel, MotionModelConfig, SensorModel, SensorModelConfig};

pub struct Agent {
    pose: Pose2D,
    motion_model: MotionModel,
    sensor_model: SensorModel,
    rng: StdRng,
}

impl Agent {
    pub fn new(
        pose: Pose2D,
        motion: MotionModelConfig,
        sensor: SensorModelConfig,
        seed: Option<u64>,
    ) -> LocalizationResult<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            pose,
            motion_model: MotionModel::new(motion)?,
            sensor_model: SensorModel::new(sensor)?,
            rng,
        })
    }

    /// True pose, for evaluation and reporting only
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Execute a command with motion noise and return the new true pose
    pub fn execute(&mut self, command: &MotionCommand) -> Pose2D {
        self.pose = self.motion_model.sample(&self.pose, command, &mut self.rng);
        self.pose
    }

    pub fn move_forward(&mut self, distance: f64) -> Pose2D {
        self.execute(&MotionCommand::forward(distance))
    }

    pub fn rotate(&mut self, rotation: f64) -> Pose2D {
        self.execute(&MotionCommand::turn(rotation))
    }

    /// Noisy ranges to `landmarks`, index-aligned with them
    pub fn sense(&mut self, landmarks: &[Point2D]) -> Vec<f64> {
        self.sensor_model.sense(&self.pose, landmarks, &mut self.rng)
    }
}
