//! Stochastic motion model shared by the simulated agent and the particles
//!
//! A command (distance, rotation) is corrupted with zero-mean Gaussian noise,
//! the noisy distance is driven along the current heading and the noisy
//! rotation is then added to the heading.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::common::{
    normalize_angle_positive, LocalizationError, LocalizationResult, MotionCommand, Pose2D,
};

/// Noise levels of the motion model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModelConfig {
    /// Translation noise standard deviation [m]
    pub sigma_pos: f64,
    /// Rotation noise standard deviation [rad]
    pub sigma_rot: f64,
}

impl Default for MotionModelConfig {
    fn default() -> Self {
        Self {
            sigma_pos: 0.1,
            sigma_rot: 0.05,
        }
    }
}

impl MotionModelConfig {
    /// Noise-free motion, handy for deterministic checks
    pub fn noiseless() -> Self {
        Self {
            sigma_pos: 0.0,
            sigma_rot: 0.0,
        }
    }

    pub fn validate(&self) -> LocalizationResult<()> {
        check_sigma("sigma_pos", self.sigma_pos)?;
        check_sigma("sigma_rot", self.sigma_rot)
    }
}

pub(crate) fn check_sigma(name: &str, sigma: f64) -> LocalizationResult<()> {
    if sigma.is_finite() && sigma >= 0.0 {
        Ok(())
    } else {
        Err(LocalizationError::InvalidParameter(format!(
            "{} must be finite and non-negative, got {}",
            name, sigma
        )))
    }
}

/// Gaussian normal(0, sigma); sigma has already been validated
pub(crate) fn zero_mean_normal(name: &str, sigma: f64) -> LocalizationResult<Normal<f64>> {
    Normal::new(0.0, sigma)
        .map_err(|e| LocalizationError::InvalidParameter(format!("{}: {}", name, e)))
}

/// Noisy odometry-free motion model
#[derive(Debug, Clone)]
pub struct MotionModel {
    dist_pos: Normal<f64>,
    dist_rot: Normal<f64>,
}

impl MotionModel {
    pub fn new(config: MotionModelConfig) -> LocalizationResult<Self> {
        config.validate()?;
        Ok(Self {
            dist_pos: zero_mean_normal("sigma_pos", config.sigma_pos)?,
            dist_rot: zero_mean_normal("sigma_rot", config.sigma_rot)?,
        })
    }

    /// Sample the pose reached from `pose` after executing `command`.
    ///
    /// Translation uses the heading *before* the rotation is applied, and the
    /// returned heading is wrapped into [0, 2pi).
    pub fn sample<R: Rng + ?Sized>(
        &self,
        pose: &Pose2D,
        command: &MotionCommand,
        rng: &mut R,
    ) -> Pose2D {
        let noisy_distance = command.distance + self.dist_pos.sample(rng);
        let noisy_rotation = command.rotation + self.dist_rot.sample(rng);
        Self::apply(pose, noisy_distance, noisy_rotation)
    }

    /// Deterministic kinematics for an already-noisy motion
    pub fn apply(pose: &Pose2D, distance: f64, rotation: f64) -> Pose2D {
        Pose2D {
            x: pose.x + distance * pose.yaw.cos(),
            y: pose.y + distance * pose.yaw.sin(),
            yaw: normalize_angle_positive(pose.yaw + rotation),
        }
    }
}
