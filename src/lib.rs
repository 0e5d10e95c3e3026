//! range_mcl - Monte Carlo localization against known range landmarks
//!
//! This crate provides a particle filter that estimates the pose of a mobile
//! agent from noisy motion commands and noisy ranges to fixed landmarks,
//! together with the stochastic models it relies on and a small simulation
//! harness.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod localization;
pub mod simulation;

// Re-export common types for convenience
pub use common::{MotionCommand, Point2D, Pose2D, Wall, Path2D};
pub use common::{StateEstimator, StatusReporter};
pub use common::{LocalizationError, LocalizationResult};
pub use localization::{ParticleFilterConfig, ParticleFilterLocalizer, Particle};
