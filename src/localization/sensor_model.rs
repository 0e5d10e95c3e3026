//! Range-to-landmark sensor model.
//!
//! The agent uses [`SensorModel::sense`] to produce noisy observations;
//! particles never sense, they are scored with [`SensorModel::likelihood`]
//! against the expected (noise-free) ranges from their own pose. The log form
//! is used when the plain product leaves floating-point range.

use itertools::Itertools;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use super::motion_model::{check_sigma, zero_mean_normal};
use crate::common::{LocalizationError, LocalizationResult, Point2D, Pose2D};

/// Noise level of the range sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorModelConfig {
    /// Range noise standard deviation [m]
    pub sigma_sense: f64,
}

impl Default for SensorModelConfig {
    fn default() -> Self {
        Self { sigma_sense: 0.3 }
    }
}

impl SensorModelConfig {
    pub fn validate(&self) -> LocalizationResult<()> {
        check_sigma("sigma_sense", self.sigma_sense)?;
        // the likelihood divides by sigma
        if self.sigma_sense == 0.0 {
            return Err(LocalizationError::InvalidParameter(
                "sigma_sense must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gaussian density of `x` under N(0, sigma)
pub fn gauss_likelihood(x: f64, sigma: f64) -> f64 {
    let coeff = 1.0 / (2.0 * PI * sigma.powi(2)).sqrt();
    coeff * (-x.powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Natural log of [`gauss_likelihood`], finite wherever the density itself
/// under- or overflows
pub fn log_gauss_likelihood(x: f64, sigma: f64) -> f64 {
    -0.5 * (2.0 * PI * sigma.powi(2)).ln() - x.powi(2) / (2.0 * sigma.powi(2))
}

#[derive(Debug, Clone)]
pub struct SensorModel {
    sigma_sense: f64,
    dist_sense: Normal<f64>,
}

impl SensorModel {
    pub fn new(config: SensorModelConfig) -> LocalizationResult<Self> {
        config.validate()?;
        Ok(Self {
            sigma_sense: config.sigma_sense,
            dist_sense: zero_mean_normal("sigma_sense", config.sigma_sense)?,
        })
    }

    /// Noise-free range from `pose` to every landmark, in landmark order
    pub fn expected_ranges(pose: &Pose2D, landmarks: &[Point2D]) -> Vec<f64> {
        let position = pose.position();
        landmarks.iter().map(|lm| position.distance(lm)).collect()
    }

    /// Noisy range to every landmark, in landmark order
    pub fn sense<R: Rng + ?Sized>(
        &self,
        pose: &Pose2D,
        landmarks: &[Point2D],
        rng: &mut R,
    ) -> Vec<f64> {
        let position = pose.position();
        landmarks
            .iter()
            .map(|lm| position.distance(lm) + self.dist_sense.sample(rng))
            .collect()
    }

    /// Product of per-landmark Gaussian densities of the range residuals
    pub fn likelihood(
        &self,
        pose: &Pose2D,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> LocalizationResult<f64> {
        Self::check_alignment(measurements, landmarks)?;
        Ok(self.aligned_likelihood(pose, measurements, landmarks))
    }

    /// Sum of per-landmark log densities of the range residuals
    pub fn log_likelihood(
        &self,
        pose: &Pose2D,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> LocalizationResult<f64> {
        Self::check_alignment(measurements, landmarks)?;
        Ok(self.aligned_log_likelihood(pose, measurements, landmarks))
    }

    /// [`Self::likelihood`] for inputs already passed through
    /// [`Self::check_alignment`]
    pub(crate) fn aligned_likelihood(
        &self,
        pose: &Pose2D,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> f64 {
        let position = pose.position();
        measurements
            .iter()
            .zip_eq(landmarks)
            .map(|(z, lm)| gauss_likelihood(z - position.distance(lm), self.sigma_sense))
            .product()
    }

    pub(crate) fn aligned_log_likelihood(
        &self,
        pose: &Pose2D,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> f64 {
        let position = pose.position();
        measurements
            .iter()
            .zip_eq(landmarks)
            .map(|(z, lm)| log_gauss_likelihood(z - position.distance(lm), self.sigma_sense))
            .sum()
    }

    pub fn check_alignment(measurements: &[f64], landmarks: &[Point2D]) -> LocalizationResult<()> {
        if measurements.len() != landmarks.len() {
            return Err(LocalizationError::MeasurementMismatch {
                measurements: measurements.len(),
                landmarks: landmarks.len(),
            });
        }
        Ok(())
    }
}
