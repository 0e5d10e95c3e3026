//! Common traits defining interfaces for localization algorithms

use crate::common::error::LocalizationResult;
use crate::common::types::*;

/// Trait for recursive state estimators (particle filter, ...)
pub trait StateEstimator {
    /// State type used by this estimator
    type State;
    /// Measurement type used by this estimator
    type Measurement: ?Sized;
    /// Control input type
    type Control;

    /// Prediction step
    fn predict(&mut self, control: &Self::Control);

    /// Update step with measurement
    fn update(&mut self, measurement: &Self::Measurement) -> LocalizationResult<()>;

    /// Get current state estimate
    fn get_state(&self) -> Self::State;

    /// Get current covariance estimate (if applicable)
    fn get_covariance(&self) -> Option<nalgebra::Matrix3<f64>> {
        None
    }
}

/// Write-only sink for per-step localization results
pub trait StatusReporter {
    /// Receive the agent's true pose and the filter's estimate for one step
    fn report(&mut self, step: usize, true_pose: &Pose2D, estimate: &Pose2D);
}
