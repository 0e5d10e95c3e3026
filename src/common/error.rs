//! Error types for range_mcl

use thiserror::Error;

/// Main error type for the localization crate
#[derive(Debug, Error)]
pub enum LocalizationError {
    /// Invalid configuration parameter (population size, noise level, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Measurement vector is not index-aligned with the landmark sequence
    #[error("Measurement mismatch: {measurements} ranges for {landmarks} landmarks")]
    MeasurementMismatch { measurements: usize, landmarks: usize },
    /// State estimation failed
    #[error("Estimation error: {0}")]
    EstimationError(String),
    /// Visualization error
    #[error("Visualization error: {0}")]
    VisualizationError(String),
}

/// Result type alias for localization operations
pub type LocalizationResult<T> = Result<T, LocalizationError>;
