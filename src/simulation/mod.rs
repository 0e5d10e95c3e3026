//! Square-path localization scenario.
//!
//! An [`Agent`] drives the sides of a square inside an [`Environment`],
//! sensing the corner landmarks after every command, while a
//! [`ParticleFilterLocalizer`] tracks it from the same commands and
//! observations. Every step is handed to a [`StatusReporter`].

pub mod agent;
pub mod environment;
pub mod reporter;

pub use agent::Agent;
pub use environment::Environment;
pub use reporter::{ConsoleReporter, Tee, TrajectoryRecorder};

use log::info;
use std::f64::consts::PI;

use crate::common::{LocalizationError, LocalizationResult, MotionCommand, Pose2D, StatusReporter};
use crate::localization::{
    MotionModelConfig, Particle, ParticleFilterConfig, ParticleFilterLocalizer, SensorModelConfig,
};

/// Parameters of the square-path run
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Edge length of the square room [m]
    pub room_size: f64,
    /// Starting pose of the agent, also the filter's initial guess
    pub initial_pose: Pose2D,
    /// Number of forward steps on each side
    pub side_lengths: Vec<usize>,
    /// Distance of one forward step [m]
    pub step_distance: f64,
    /// Turn at the end of each side [rad]; positive turns left
    pub turn_angle: f64,
    pub filter: ParticleFilterConfig,
    /// Seed of the agent's own random stream
    pub agent_seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            room_size: 10.0,
            initial_pose: Pose2D::new(1.0, 1.0, 0.0),
            side_lengths: vec![8; 4],
            step_distance: 1.0,
            turn_angle: PI / 2.0,
            filter: ParticleFilterConfig {
                num_particles: 500,
                motion: MotionModelConfig {
                    sigma_pos: 0.1,
                    sigma_rot: 0.05,
                },
                sensor: SensorModelConfig { sigma_sense: 0.3 },
                ..Default::default()
            },
            agent_seed: None,
        }
    }
}

impl ScenarioConfig {
    /// Command sequence: the forward steps of each side followed by one turn
    pub fn commands(&self) -> Vec<MotionCommand> {
        self.side_lengths
            .iter()
            .flat_map(|&steps| {
                std::iter::repeat(MotionCommand::forward(self.step_distance))
                    .take(steps)
                    .chain(std::iter::once(MotionCommand::turn(self.turn_angle)))
            })
            .collect()
    }

    pub fn validate(&self) -> LocalizationResult<()> {
        if !(self.room_size.is_finite() && self.room_size > 0.0) {
            return Err(LocalizationError::InvalidParameter(format!(
                "room_size must be > 0, got {}",
                self.room_size
            )));
        }
        if !self.step_distance.is_finite() || !self.turn_angle.is_finite() {
            return Err(LocalizationError::InvalidParameter(
                "step_distance and turn_angle must be finite".to_string(),
            ));
        }
        self.filter.validate()
    }
}

/// Outcome of one step of the scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub command: MotionCommand,
    pub true_pose: Pose2D,
    pub estimate: Pose2D,
    pub resampled: bool,
}

impl StepRecord {
    pub fn position_error(&self) -> f64 {
        self.estimate.distance(&self.true_pose)
    }

    pub fn heading_error(&self) -> f64 {
        self.estimate.heading_error(&self.true_pose)
    }

    /// Whether both axis errors are below `tolerance`
    pub fn within(&self, tolerance: f64) -> bool {
        (self.estimate.x - self.true_pose.x).abs() < tolerance
            && (self.estimate.y - self.true_pose.y).abs() < tolerance
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub records: Vec<StepRecord>,
    /// Population after the last step
    pub final_particles: Vec<Particle>,
}

impl ScenarioSummary {
    pub fn num_steps(&self) -> usize {
        self.records.len()
    }

    pub fn resample_count(&self) -> usize {
        self.records.iter().filter(|r| r.resampled).count()
    }

    pub fn position_rmse(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.records.iter().map(|r| r.position_error().powi(2)).sum();
        (sum_sq / self.records.len() as f64).sqrt()
    }

    /// Share of steps whose estimate is within `tolerance` on both axes
    pub fn fraction_within(&self, tolerance: f64) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let hits = self.records.iter().filter(|r| r.within(tolerance)).count();
        hits as f64 / self.records.len() as f64
    }
}

/// Drive the square path and track it with the particle filter
pub fn run_square_path<S: StatusReporter + ?Sized>(
    config: &ScenarioConfig,
    reporter: &mut S,
) -> LocalizationResult<ScenarioSummary> {
    config.validate()?;

    let environment = Environment::square_room(config.room_size);
    let mut agent = Agent::new(
        config.initial_pose,
        config.filter.motion,
        config.filter.sensor,
        config.agent_seed,
    )?;
    let mut filter = ParticleFilterLocalizer::new(config.filter.clone(), config.initial_pose)?;

    let commands = config.commands();
    info!(
        "Square path start: {} steps, {} particles",
        commands.len(),
        config.filter.num_particles
    );

    let mut records = Vec::with_capacity(commands.len());
    for (step, command) in commands.iter().enumerate() {
        let true_pose = agent.execute(command);
        let measurements = agent.sense(environment.landmarks());
        let estimate = filter.update_and_estimate(command, &measurements, environment.landmarks())?;

        reporter.report(step, &true_pose, &estimate);
        records.push(StepRecord {
            step,
            command: *command,
            true_pose,
            estimate,
            resampled: filter.status().resampled,
        });
    }

    let summary = ScenarioSummary {
        records,
        final_particles: filter.particles().to_vec(),
    };
    info!(
        "Square path done: position RMSE = {:.3} m, resampled {}/{} steps",
        summary.position_rmse(),
        summary.resample_count(),
        summary.num_steps()
    );
    Ok(summary)
}
