// Localization algorithms module

pub mod motion_model;
pub mod particle_filter;
pub mod sensor_model;

// Re-exports
pub use motion_model::{MotionModel, MotionModelConfig};
pub use particle_filter::{
    FilterStatus, Particle, ParticleFilterConfig, ParticleFilterLocalizer, RangeObservation,
};
pub use sensor_model::{gauss_likelihood, log_gauss_likelihood, SensorModel, SensorModelConfig};
