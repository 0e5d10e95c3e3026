//! Particle filter (Monte Carlo localization) against known range landmarks.
//!
//! Each step moves every particle through the stochastic motion model, scores
//! it with the product of per-landmark Gaussian range likelihoods, resamples
//! when the effective sample size drops below a fraction of the population,
//! and reports the circular-mean pose of the population.

use log::{debug, info, warn};
use nalgebra::Matrix3;
use ordered_float::OrderedFloat;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use rayon::prelude::*;

use super::motion_model::{MotionModel, MotionModelConfig};
use super::sensor_model::{SensorModel, SensorModelConfig};
use crate::common::{
    normalize_angle, LocalizationError, LocalizationResult, MotionCommand, Point2D, Pose2D,
    StateEstimator,
};

/// Stabilizer for N_eff = 1 / (sum w^2 + eps) when all weights are zero
const N_EFF_EPSILON: f64 = 1e-6;

/// Particles per random stream during motion update
const PARTITION_SIZE: usize = 64;

/// A weighted pose hypothesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pose: Pose2D,
    pub weight: f64,
}

impl Particle {
    pub fn new(pose: Pose2D, weight: f64) -> Self {
        Self { pose, weight }
    }
}

/// One range reading paired with the landmark it was taken to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeObservation {
    pub range: f64,
    pub landmark: Point2D,
}

impl RangeObservation {
    /// Pair an index-aligned measurement vector with its landmarks
    pub fn pair(measurements: &[f64], landmarks: &[Point2D]) -> LocalizationResult<Vec<Self>> {
        SensorModel::check_alignment(measurements, landmarks)?;
        Ok(measurements
            .iter()
            .zip(landmarks)
            .map(|(&range, &landmark)| Self { range, landmark })
            .collect())
    }
}

/// Configuration for the particle filter
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFilterConfig {
    /// Population size N, fixed for the lifetime of the filter
    pub num_particles: usize,
    /// Motion noise; also the spread of the initial population
    pub motion: MotionModelConfig,
    /// Range noise used by the likelihood
    pub sensor: SensorModelConfig,
    /// Resample when N_eff < num_particles * resampling_threshold
    pub resampling_threshold: f64,
    /// Seed of the filter's random stream (None draws one from the OS)
    pub seed: Option<u64>,
    /// Propagate and weight particles on the rayon thread pool
    pub parallel: bool,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            num_particles: 500,
            motion: MotionModelConfig::default(),
            sensor: SensorModelConfig::default(),
            resampling_threshold: 0.5,
            seed: None,
            parallel: false,
        }
    }
}

impl ParticleFilterConfig {
    pub fn validate(&self) -> LocalizationResult<()> {
        if self.num_particles == 0 {
            return Err(LocalizationError::InvalidParameter(
                "num_particles must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resampling_threshold) {
            return Err(LocalizationError::InvalidParameter(format!(
                "resampling_threshold must be in [0, 1], got {}",
                self.resampling_threshold
            )));
        }
        self.motion.validate()?;
        self.sensor.validate()
    }
}

/// Diagnostics of the most recent step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterStatus {
    /// Effective sample size after weighting
    pub n_eff: f64,
    /// Whether the population was resampled
    pub resampled: bool,
    /// Whether the likelihood total left floating-point range and the weights
    /// were recomputed from log-likelihoods
    pub rescaled: bool,
    /// Whether no usable weight could be computed and weights were reset to
    /// uniform
    pub degenerate: bool,
    /// Largest normalized weight before resampling
    pub max_weight: f64,
    /// Number of completed steps
    pub iterations: u64,
}

/// Particle filter localizer over a fixed landmark map
#[derive(Debug, Clone)]
pub struct ParticleFilterLocalizer {
    config: ParticleFilterConfig,
    particles: Vec<Particle>,
    motion_model: MotionModel,
    sensor_model: SensorModel,
    rng: StdRng,
    status: FilterStatus,
}

impl ParticleFilterLocalizer {
    /// Create a filter with a population drawn around `initial_pose`
    pub fn new(config: ParticleFilterConfig, initial_pose: Pose2D) -> LocalizationResult<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let motion_model = MotionModel::new(config.motion)?;
        let sensor_model = SensorModel::new(config.sensor)?;
        let particles = Self::initialize_particles(
            config.num_particles,
            &initial_pose,
            &config.motion,
            &mut rng,
        )?;

        info!(
            "Particle filter initialized: {} particles around ({:.3}, {:.3}, {:.3})",
            config.num_particles, initial_pose.x, initial_pose.y, initial_pose.yaw
        );

        Ok(Self {
            config,
            particles,
            motion_model,
            sensor_model,
            rng,
            status: FilterStatus::default(),
        })
    }

    /// Draw `num_particles` poses from a Gaussian around `center`, each with
    /// weight 1/N
    pub fn initialize_particles<R: Rng + ?Sized>(
        num_particles: usize,
        center: &Pose2D,
        spread: &MotionModelConfig,
        rng: &mut R,
    ) -> LocalizationResult<Vec<Particle>> {
        if num_particles == 0 {
            return Err(LocalizationError::InvalidParameter(
                "num_particles must be > 0".to_string(),
            ));
        }
        spread.validate()?;

        let to_err =
            |e: rand_distr::NormalError| LocalizationError::InvalidParameter(e.to_string());
        let normal_x = Normal::new(center.x, spread.sigma_pos).map_err(to_err)?;
        let normal_y = Normal::new(center.y, spread.sigma_pos).map_err(to_err)?;
        let normal_yaw = Normal::new(center.yaw, spread.sigma_rot).map_err(to_err)?;
        let weight = 1.0 / num_particles as f64;

        Ok((0..num_particles)
            .map(|_| {
                let pose = Pose2D::new(
                    normal_x.sample(rng),
                    normal_y.sample(rng),
                    normal_yaw.sample(rng),
                );
                Particle::new(pose, weight)
            })
            .collect())
    }

    /// Replace the population with a fresh one around `pose`, keeping N
    pub fn reinitialize(&mut self, pose: &Pose2D) -> LocalizationResult<()> {
        self.particles = Self::initialize_particles(
            self.config.num_particles,
            pose,
            &self.config.motion,
            &mut self.rng,
        )?;
        self.status = FilterStatus::default();
        info!(
            "Particle filter reinitialized around ({:.3}, {:.3}, {:.3})",
            pose.x, pose.y, pose.yaw
        );
        Ok(())
    }

    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }

    /// Current population (read-only)
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn status(&self) -> &FilterStatus {
        &self.status
    }

    /// Move every particle through the motion model with independent noise.
    ///
    /// Each partition of [`PARTITION_SIZE`] particles gets its own stream
    /// seeded from the filter's stream, so sequential and parallel runs
    /// produce the same population for the same seed.
    pub fn motion_update(&mut self, command: &MotionCommand) {
        let partitions = (self.particles.len() + PARTITION_SIZE - 1) / PARTITION_SIZE;
        let seeds: Vec<u64> = (0..partitions).map(|_| self.rng.gen()).collect();
        let model = &self.motion_model;

        if self.config.parallel {
            self.particles
                .par_chunks_mut(PARTITION_SIZE)
                .zip(seeds.par_iter())
                .for_each(|(chunk, &seed)| propagate_partition(model, command, chunk, seed));
        } else {
            self.particles
                .chunks_mut(PARTITION_SIZE)
                .zip(seeds.iter())
                .for_each(|(chunk, &seed)| propagate_partition(model, command, chunk, seed));
        }
    }

    /// Score every particle against the measurements and normalize.
    ///
    /// Returns the unnormalized total weight. When that total underflows to
    /// zero or overflows, the weights are recomputed from log-likelihoods
    /// shifted by their maximum and the step is flagged as rescaled. Only
    /// when no finite log-likelihood exists are the weights reset to uniform
    /// and the step flagged as degenerate.
    pub fn calculate_weights(
        &mut self,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> LocalizationResult<f64> {
        SensorModel::check_alignment(measurements, landmarks)?;

        let sensor = &self.sensor_model;
        let parallel = self.config.parallel;
        assign_weights(&mut self.particles, parallel, |pose| {
            sensor.aligned_likelihood(pose, measurements, landmarks)
        });

        let total_weight: f64 = self.particles.iter().map(|p| p.weight).sum();
        self.status.rescaled = false;
        self.status.degenerate = false;

        if total_weight > 0.0 && total_weight.is_finite() {
            self.scale_weights(total_weight);
        } else {
            assign_weights(&mut self.particles, parallel, |pose| {
                sensor.aligned_log_likelihood(pose, measurements, landmarks)
            });
            let max_log = self
                .particles
                .iter()
                .map(|p| p.weight)
                .fold(f64::NEG_INFINITY, f64::max);
            let has_nan = self.particles.iter().any(|p| p.weight.is_nan());

            if max_log.is_finite() && !has_nan {
                warn!(
                    "Particle likelihoods out of range (total = {:e}); rescaling {} weights \
                     in log space",
                    total_weight,
                    self.particles.len()
                );
                for particle in &mut self.particles {
                    particle.weight = (particle.weight - max_log).exp();
                }
                // the best particle contributes exp(0) = 1
                let rescaled_total: f64 = self.particles.iter().map(|p| p.weight).sum();
                self.scale_weights(rescaled_total);
                self.status.rescaled = true;
            } else {
                warn!(
                    "Degenerate particle weights (total = {:e}); resetting {} particles to uniform",
                    total_weight,
                    self.particles.len()
                );
                self.reset_uniform_weights();
                self.status.degenerate = true;
            }
        }
        self.status.max_weight = self.max_weight();

        Ok(total_weight)
    }

    fn scale_weights(&mut self, total: f64) {
        for particle in &mut self.particles {
            particle.weight /= total;
        }
    }

    fn reset_uniform_weights(&mut self) {
        let uniform = 1.0 / self.particles.len() as f64;
        for particle in &mut self.particles {
            particle.weight = uniform;
        }
    }

    fn max_weight(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| OrderedFloat(p.weight))
            .max()
            .map_or(0.0, |w| w.0)
    }

    /// N_eff = 1 / (sum w^2 + eps)
    pub fn effective_sample_size(&self) -> f64 {
        let sum_w_squared: f64 = self.particles.iter().map(|p| p.weight * p.weight).sum();
        1.0 / (sum_w_squared + N_EFF_EPSILON)
    }

    /// Whether the population has collapsed onto too few particles
    pub fn needs_resampling(&self) -> bool {
        let threshold = self.particles.len() as f64 * self.config.resampling_threshold;
        self.effective_sample_size() < threshold
    }

    /// Draw N particles with replacement proportionally to their weights.
    ///
    /// Drawn particles get weight 1/N.
    pub fn resample(&mut self) -> LocalizationResult<()> {
        let n = self.particles.len();
        let dist = WeightedIndex::new(self.particles.iter().map(|p| p.weight))
            .map_err(|e| LocalizationError::EstimationError(format!("Cannot resample: {}", e)))?;
        let uniform = 1.0 / n as f64;

        let particles = &self.particles;
        let rng = &mut self.rng;
        let resampled: Vec<Particle> = (0..n)
            .map(|_| Particle::new(particles[dist.sample(rng)].pose, uniform))
            .collect();

        self.particles = resampled;
        debug!("Resampled {} particles", n);
        Ok(())
    }

    /// Resample only when [`Self::needs_resampling`] says so.
    ///
    /// Never resamples a degenerate step, whose weights carry no information.
    pub fn resample_if_needed(&mut self) -> LocalizationResult<bool> {
        if self.status.degenerate || !self.needs_resampling() {
            return Ok(false);
        }
        self.resample()?;
        Ok(true)
    }

    /// Unweighted mean position and circular-mean heading of the population
    pub fn estimate(&self) -> Pose2D {
        let n = self.particles.len() as f64;
        let (sum_x, sum_y, sum_sin, sum_cos) =
            self.particles
                .iter()
                .fold((0.0, 0.0, 0.0, 0.0), |(sx, sy, ss, sc), p| {
                    let yaw = p.pose.yaw;
                    (sx + p.pose.x, sy + p.pose.y, ss + yaw.sin(), sc + yaw.cos())
                });
        Pose2D::new(sum_x / n, sum_y / n, (sum_sin / n).atan2(sum_cos / n))
    }

    /// Weight-averaged position and circular-mean heading.
    ///
    /// Falls back to [`Self::estimate`] if the weights sum to zero.
    pub fn estimate_weighted(&self) -> Pose2D {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if !(total > 0.0) {
            return self.estimate();
        }
        let (sum_x, sum_y, sum_sin, sum_cos) =
            self.particles
                .iter()
                .fold((0.0, 0.0, 0.0, 0.0), |(sx, sy, ss, sc), p| {
                    let (w, yaw) = (p.weight, p.pose.yaw);
                    (
                        sx + w * p.pose.x,
                        sy + w * p.pose.y,
                        ss + w * yaw.sin(),
                        sc + w * yaw.cos(),
                    )
                });
        Pose2D::new(sum_x / total, sum_y / total, sum_sin.atan2(sum_cos))
    }

    /// Particle with the largest weight
    pub fn best_particle(&self) -> Option<&Particle> {
        self.particles.iter().max_by_key(|p| OrderedFloat(p.weight))
    }

    /// Sample covariance of (x, y, yaw) around [`Self::estimate`]; heading
    /// residuals are wrapped into [-pi, pi)
    pub fn covariance(&self) -> Matrix3<f64> {
        let est = self.estimate().to_vector();
        let n = self.particles.len() as f64;
        self.particles
            .iter()
            .map(|p| {
                let mut d = p.pose.to_vector() - est;
                d[2] = normalize_angle(d[2]);
                d * d.transpose()
            })
            .sum::<Matrix3<f64>>()
            / n
    }

    /// Full filter step: move, weight, conditionally resample, estimate
    pub fn update_and_estimate(
        &mut self,
        command: &MotionCommand,
        measurements: &[f64],
        landmarks: &[Point2D],
    ) -> LocalizationResult<Pose2D> {
        // reject before the population is touched
        SensorModel::check_alignment(measurements, landmarks)?;

        self.motion_update(command);
        self.calculate_weights(measurements, landmarks)?;
        self.status.n_eff = self.effective_sample_size();
        self.status.resampled = self.resample_if_needed()?;
        self.status.iterations += 1;

        debug!(
            "Step {}: n_eff = {:.1}, max_weight = {:.4}, resampled = {}, rescaled = {}, \
             degenerate = {}",
            self.status.iterations,
            self.status.n_eff,
            self.status.max_weight,
            self.status.resampled,
            self.status.rescaled,
            self.status.degenerate
        );

        Ok(self.estimate())
    }
}

fn propagate_partition(
    model: &MotionModel,
    command: &MotionCommand,
    chunk: &mut [Particle],
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    for particle in chunk.iter_mut() {
        particle.pose = model.sample(&particle.pose, command, &mut rng);
    }
}

fn assign_weights<F>(particles: &mut [Particle], parallel: bool, score: F)
where
    F: Fn(&Pose2D) -> f64 + Sync,
{
    if parallel {
        particles.par_iter_mut().for_each(|p| p.weight = score(&p.pose));
    } else {
        particles.iter_mut().for_each(|p| p.weight = score(&p.pose));
    }
}

impl StateEstimator for ParticleFilterLocalizer {
    type State = Pose2D;
    type Measurement = [RangeObservation];
    type Control = MotionCommand;

    fn predict(&mut self, control: &Self::Control) {
        self.motion_update(control);
    }

    fn update(&mut self, measurement: &Self::Measurement) -> LocalizationResult<()> {
        let (ranges, landmarks): (Vec<f64>, Vec<Point2D>) =
            measurement.iter().map(|o| (o.range, o.landmark)).unzip();
        self.calculate_weights(&ranges, &landmarks)?;
        self.status.n_eff = self.effective_sample_size();
        self.status.resampled = self.resample_if_needed()?;
        self.status.iterations += 1;
        Ok(())
    }

    fn get_state(&self) -> Self::State {
        self.estimate()
    }

    fn get_covariance(&self) -> Option<Matrix3<f64>> {
        Some(self.covariance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn corners() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 10.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, 0.0),
        ]
    }

    fn seeded_config(num_particles: usize) -> ParticleFilterConfig {
        ParticleFilterConfig {
            num_particles,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn seeded_filter(num_particles: usize, initial_pose: Pose2D) -> ParticleFilterLocalizer {
        ParticleFilterLocalizer::new(seeded_config(num_particles), initial_pose).unwrap()
    }

    fn filter_with(particles: Vec<Particle>) -> ParticleFilterLocalizer {
        filter_with_config(seeded_config(particles.len()), particles)
    }

    fn filter_with_config(
        config: ParticleFilterConfig,
        particles: Vec<Particle>,
    ) -> ParticleFilterLocalizer {
        let mut pf = ParticleFilterLocalizer::new(config, Pose2D::origin()).unwrap();
        pf.particles = particles;
        pf
    }

    fn weight_sum(pf: &ParticleFilterLocalizer) -> f64 {
        pf.particles().iter().map(|p| p.weight).sum()
    }

    #[test]
    fn test_initialization() {
        let pf = seeded_filter(500, Pose2D::new(1.0, 1.0, 0.0));
        assert_eq!(pf.num_particles(), 500);
        assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-9);
        for p in pf.particles() {
            assert_relative_eq!(p.weight, 1.0 / 500.0);
            assert!(p.pose.yaw >= 0.0 && p.pose.yaw < 2.0 * PI);
        }
        let est = pf.estimate();
        assert!((est.x - 1.0).abs() < 0.05, "x: {}", est.x);
        assert!((est.y - 1.0).abs() < 0.05, "y: {}", est.y);
        assert!(est.heading_error(&Pose2D::origin()).abs() < 0.02, "yaw: {}", est.yaw);
    }

    #[test]
    fn test_zero_particles_rejected() {
        let result = ParticleFilterLocalizer::new(seeded_config(0), Pose2D::origin());
        assert!(matches!(result, Err(LocalizationError::InvalidParameter(_))));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = ParticleFilterConfig { resampling_threshold: 1.5, ..seeded_config(10) };
        assert!(ParticleFilterLocalizer::new(config, Pose2D::origin()).is_err());
    }

    #[test]
    fn test_motion_update_moves_poses_only() {
        let mut pf = seeded_filter(200, Pose2D::new(1.0, 1.0, 0.0));
        let before = pf.estimate();
        pf.motion_update(&MotionCommand::new(1.0, -PI / 2.0));
        let after = pf.estimate();

        assert!((after.x - before.x - 1.0).abs() < 0.1, "dx: {}", after.x - before.x);
        assert!(after.heading_error(&Pose2D::new(0.0, 0.0, 1.5 * PI)).abs() < 0.05);
        for p in pf.particles() {
            assert_relative_eq!(p.weight, 1.0 / 200.0);
            assert!(p.pose.yaw >= 0.0 && p.pose.yaw < 2.0 * PI);
        }
    }

    #[test]
    fn test_particles_draw_independent_noise() {
        let particles = vec![Particle::new(Pose2D::origin(), 0.25); 4];
        let mut pf = filter_with(particles);
        pf.motion_update(&MotionCommand::forward(1.0));
        let xs: Vec<f64> = pf.particles().iter().map(|p| p.pose.x).collect();
        assert!(xs.windows(2).all(|w| w[0] != w[1]), "identical noise: {:?}", xs);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let init = Pose2D::new(2.0, 3.0, 0.5);
        let mut sequential = ParticleFilterLocalizer::new(seeded_config(300), init).unwrap();
        let config = ParticleFilterConfig { parallel: true, ..seeded_config(300) };
        let mut parallel = ParticleFilterLocalizer::new(config, init).unwrap();
        let z = SensorModel::expected_ranges(&Pose2D::new(3.0, 3.0, 0.5), &corners());
        let command = MotionCommand::forward(1.0);

        for _ in 0..3 {
            let a = sequential.update_and_estimate(&command, &z, &corners()).unwrap();
            let b = parallel.update_and_estimate(&command, &z, &corners()).unwrap();
            assert_eq!(a, b);
        }
        assert_eq!(sequential.particles(), parallel.particles());
    }

    #[test]
    fn test_weights_normalized() {
        let mut pf = seeded_filter(100, Pose2D::new(4.0, 6.0, 0.0));
        let z = SensorModel::expected_ranges(&Pose2D::new(4.1, 5.9, 0.0), &corners());
        let total = pf.calculate_weights(&z, &corners()).unwrap();
        assert!(total > 0.0);
        assert!(!pf.status().degenerate);
        assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mismatched_measurements_rejected() {
        let mut pf = seeded_filter(50, Pose2D::new(1.0, 1.0, 0.0));
        let before = pf.particles().to_vec();
        let z = [1.0, 2.0, 3.0];
        let result = pf.update_and_estimate(&MotionCommand::forward(1.0), &z, &corners());
        assert!(matches!(
            result,
            Err(LocalizationError::MeasurementMismatch { measurements: 3, landmarks: 4 })
        ));
        assert_eq!(pf.particles(), &before[..]);
    }

    #[test]
    fn test_underflowing_likelihoods_rescaled() {
        let mut pf = seeded_filter(100, Pose2D::new(1.0, 1.0, 0.0));
        // every residual is ~1e6 sigma, so each plain likelihood underflows to 0
        let z = vec![1.0e6; 4];
        let total = pf.calculate_weights(&z, &corners()).unwrap();

        assert_eq!(total, 0.0);
        assert!(pf.status().rescaled);
        assert!(!pf.status().degenerate);
        assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-9);
        assert_relative_eq!(pf.status().max_weight, pf.best_particle().unwrap().weight);

        assert!(pf.resample_if_needed().unwrap());
        assert_eq!(pf.num_particles(), 100);
    }

    #[test]
    fn test_overflowing_likelihoods_rescaled() {
        let truth = Pose2D::new(3.0, 4.0, 0.0);
        let particles = vec![
            Particle::new(Pose2D::new(3.5, 4.0, 0.0), 0.25),
            Particle::new(truth, 0.25),
            Particle::new(Pose2D::new(3.0, 4.5, 0.0), 0.25),
            Particle::new(Pose2D::new(2.0, 2.0, 0.0), 0.25),
        ];
        let config = ParticleFilterConfig {
            sensor: SensorModelConfig { sigma_sense: 1e-90 },
            ..seeded_config(4)
        };
        let mut pf = filter_with_config(config, particles);
        // each density at zero residual is ~4e89, so the product of four is +inf
        let z = SensorModel::expected_ranges(&truth, &corners());
        let total = pf.calculate_weights(&z, &corners()).unwrap();

        assert!(total.is_infinite());
        assert!(pf.status().rescaled);
        assert!(!pf.status().degenerate);
        assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-12);
        let best = pf.best_particle().unwrap();
        assert_eq!(best.pose, truth);
        assert_relative_eq!(best.weight, 1.0, epsilon = 1e-12);
        assert_relative_eq!(pf.status().max_weight, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_measurements_reset_to_uniform() {
        let mut pf = seeded_filter(100, Pose2D::new(1.0, 1.0, 0.0));
        let z = vec![f64::NAN; 4];
        let est = pf.update_and_estimate(&MotionCommand::zero(), &z, &corners()).unwrap();

        assert!(pf.status().degenerate);
        assert!(!pf.status().rescaled);
        assert!(!pf.status().resampled);
        assert_eq!(pf.num_particles(), 100);
        for p in pf.particles() {
            assert_relative_eq!(p.weight, 0.01);
        }
        assert!(est.x.is_finite() && est.y.is_finite() && est.yaw.is_finite());
    }

    #[test]
    fn test_weights_in_range_not_rescaled() {
        let mut pf = seeded_filter(100, Pose2D::new(4.0, 6.0, 0.0));
        let z = SensorModel::expected_ranges(&Pose2D::new(4.0, 6.0, 0.0), &corners());
        pf.calculate_weights(&z, &corners()).unwrap();
        assert!(!pf.status().rescaled);
        assert!(!pf.status().degenerate);
    }

    #[test]
    fn test_single_dominant_particle_triggers_resampling() {
        let n = 100;
        let mut particles: Vec<Particle> = (0..n)
            .map(|i| Particle::new(Pose2D::new(i as f64, 0.0, 0.0), 0.0))
            .collect();
        particles[17].weight = 1.0;
        let mut pf = filter_with(particles);

        let n_eff = pf.effective_sample_size();
        assert_relative_eq!(n_eff, 1.0, epsilon = 1e-4);
        assert!(pf.needs_resampling());

        assert!(pf.resample_if_needed().unwrap());
        assert_eq!(pf.num_particles(), n);
        for p in pf.particles() {
            assert_relative_eq!(p.pose.x, 17.0);
            assert_relative_eq!(p.weight, 1.0 / n as f64);
        }
    }

    #[test]
    fn test_uniform_weights_skip_resampling() {
        let n = 100;
        let particles: Vec<Particle> = (0..n)
            .map(|i| {
                let pose = Pose2D::new(i as f64, 0.5 * i as f64, 0.01 * i as f64);
                Particle::new(pose, 1.0 / n as f64)
            })
            .collect();
        let mut pf = filter_with(particles.clone());

        let n_eff = pf.effective_sample_size();
        assert!((n_eff - n as f64).abs() < 0.1, "n_eff: {}", n_eff);
        assert!(!pf.needs_resampling());
        assert!(!pf.resample_if_needed().unwrap());
        assert_eq!(pf.particles(), &particles[..]);
    }

    #[test]
    fn test_resample_follows_weights() {
        let particles = vec![
            Particle::new(Pose2D::new(0.0, 0.0, 0.0), 0.9),
            Particle::new(Pose2D::new(1.0, 0.0, 0.0), 0.1),
            Particle::new(Pose2D::new(2.0, 0.0, 0.0), 0.0),
        ];
        let mut pf = filter_with(particles);
        let mut counts = [0usize; 3];
        for _ in 0..200 {
            let snapshot = pf.particles.clone();
            pf.resample().unwrap();
            for p in pf.particles() {
                counts[p.pose.x as usize] += 1;
            }
            pf.particles = snapshot;
        }
        assert_eq!(counts[2], 0);
        assert!(counts[0] > counts[1] * 4, "counts: {:?}", counts);
    }

    #[test]
    fn test_resample_all_zero_weights_fails() {
        let particles = vec![
            Particle::new(Pose2D::new(0.0, 0.0, 0.0), 0.0),
            Particle::new(Pose2D::new(1.0, 0.0, 0.0), 0.0),
            Particle::new(Pose2D::new(2.0, 0.0, 0.0), 0.0),
        ];
        let mut pf = filter_with(particles.clone());
        assert!(matches!(pf.resample(), Err(LocalizationError::EstimationError(_))));
        assert_eq!(pf.particles(), &particles[..]);
    }

    #[test]
    fn test_flat_likelihood_step_skips_resampling() {
        let config = ParticleFilterConfig {
            sensor: SensorModelConfig { sigma_sense: 1000.0 },
            ..seeded_config(200)
        };
        let mut pf = ParticleFilterLocalizer::new(config, Pose2D::new(1.0, 1.0, 0.0)).unwrap();
        let mut moved_only = pf.clone();
        let command = MotionCommand::forward(1.0);
        let z = SensorModel::expected_ranges(&Pose2D::new(2.0, 1.0, 0.0), &corners());

        moved_only.motion_update(&command);
        pf.update_and_estimate(&command, &z, &corners()).unwrap();

        assert!(!pf.status().resampled);
        assert!(!pf.status().rescaled && !pf.status().degenerate);
        assert!(pf.status().n_eff > 199.0, "n_eff: {}", pf.status().n_eff);
        assert_eq!(pf.status().iterations, 1);
        let poses: Vec<Pose2D> = pf.particles().iter().map(|p| p.pose).collect();
        let expected: Vec<Pose2D> = moved_only.particles().iter().map(|p| p.pose).collect();
        assert_eq!(poses, expected);
        assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_circular_mean_across_wrap() {
        let particles = vec![
            Particle::new(Pose2D::new(0.0, 0.0, 0.1), 0.5),
            Particle::new(Pose2D::new(0.0, 0.0, 2.0 * PI - 0.1), 0.5),
        ];
        let pf = filter_with(particles);
        let est = pf.estimate();
        assert!(est.heading_error(&Pose2D::origin()).abs() < 1e-9, "yaw: {}", est.yaw);
        assert!((est.yaw - PI).abs() > 3.0);
    }

    #[test]
    fn test_estimate_is_idempotent() {
        let mut pf = seeded_filter(100, Pose2D::new(1.0, 1.0, 0.0));
        let z = SensorModel::expected_ranges(&Pose2D::new(2.0, 1.0, 0.0), &corners());
        pf.update_and_estimate(&MotionCommand::forward(1.0), &z, &corners()).unwrap();
        assert_eq!(pf.estimate(), pf.estimate());
        assert_eq!(pf.estimate_weighted(), pf.estimate_weighted());
    }

    #[test]
    fn test_weighted_estimate() {
        let particles = vec![
            Particle::new(Pose2D::new(0.0, 0.0, 0.0), 0.75),
            Particle::new(Pose2D::new(4.0, 8.0, PI / 2.0), 0.25),
        ];
        let pf = filter_with(particles);
        let weighted = pf.estimate_weighted();
        assert_relative_eq!(weighted.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(weighted.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(weighted.yaw, (0.25f64).atan2(0.75), epsilon = 1e-12);

        let unweighted = pf.estimate();
        assert_relative_eq!(unweighted.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(unweighted.y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_best_particle() {
        let particles = vec![
            Particle::new(Pose2D::new(0.0, 0.0, 0.0), 0.2),
            Particle::new(Pose2D::new(3.0, 0.0, 0.0), 0.5),
            Particle::new(Pose2D::new(5.0, 0.0, 0.0), 0.3),
        ];
        let pf = filter_with(particles);
        assert_relative_eq!(pf.best_particle().unwrap().pose.x, 3.0);
    }

    #[test]
    fn test_covariance_wraps_heading() {
        let particles = vec![
            Particle::new(Pose2D::new(-1.0, 0.0, 0.1), 0.5),
            Particle::new(Pose2D::new(1.0, 0.0, 2.0 * PI - 0.1), 0.5),
        ];
        let pf = filter_with(particles);
        let cov = pf.covariance();
        assert_relative_eq!(cov[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(2, 2)], 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_population_size_preserved_over_steps() {
        let mut pf = seeded_filter(250, Pose2D::new(1.0, 1.0, 0.0));
        let mut truth = Pose2D::new(1.0, 1.0, 0.0);
        for _ in 0..10 {
            truth = MotionModel::apply(&truth, 1.0, 0.0);
            let z = SensorModel::expected_ranges(&truth, &corners());
            pf.update_and_estimate(&MotionCommand::forward(1.0), &z, &corners()).unwrap();
            assert_eq!(pf.num_particles(), 250);
            assert_relative_eq!(weight_sum(&pf), 1.0, epsilon = 1e-9);
        }
        assert_eq!(pf.status().iterations, 10);
    }

    #[test]
    fn test_reinitialize() {
        let mut pf = seeded_filter(100, Pose2D::new(1.0, 1.0, 0.0));
        pf.reinitialize(&Pose2D::new(8.0, 8.0, PI)).unwrap();
        assert_eq!(pf.num_particles(), 100);
        let est = pf.estimate();
        assert!((est.x - 8.0).abs() < 0.1);
        assert!((est.y - 8.0).abs() < 0.1);
        assert_eq!(pf.status().iterations, 0);
    }

    #[test]
    fn test_state_estimator_trait() {
        let mut pf = seeded_filter(200, Pose2D::new(1.0, 1.0, 0.0));
        let truth = Pose2D::new(2.0, 1.0, 0.0);
        let z = SensorModel::expected_ranges(&truth, &corners());
        let observations = RangeObservation::pair(&z, &corners()).unwrap();

        pf.predict(&MotionCommand::forward(1.0));
        pf.update(&observations).unwrap();
        let state = pf.get_state();
        assert!(state.distance(&truth) < 0.3, "state: {:?}", state);
        assert!(pf.get_covariance().is_some());
        assert!(RangeObservation::pair(&z[..2], &corners()).is_err());
    }
}
