// Particle filter localization along a square path
//
// An agent drives the sides of a square room while ranging to the four corner
// landmarks; the particle filter tracks it from the same commands and ranges.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use range_mcl::common::{LocalizationResult, Pose2D};
use range_mcl::localization::{MotionModelConfig, ParticleFilterConfig, SensorModelConfig};
use range_mcl::simulation::{
    run_square_path, ConsoleReporter, Environment, ScenarioConfig, ScenarioSummary, Tee,
    TrajectoryRecorder,
};
use range_mcl::utils::{colors, PathStyle, PointStyle, Visualizer};

#[derive(Parser, Debug)]
#[command(name = "square_path", about = "Monte Carlo localization against range landmarks")]
struct Cli {
    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 500)]
    num_particles: usize,

    /// Translation noise standard deviation [m]
    #[arg(long, default_value_t = 0.1)]
    sigma_pos: f64,

    /// Rotation noise standard deviation [rad]
    #[arg(long, default_value_t = 0.05)]
    sigma_rot: f64,

    /// Range noise standard deviation [m]
    #[arg(long, default_value_t = 0.3)]
    sigma_sense: f64,

    /// Initial x [m]
    #[arg(long, default_value_t = 1.0)]
    x: f64,

    /// Initial y [m]
    #[arg(long, default_value_t = 1.0)]
    y: f64,

    /// Initial heading [rad]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    theta: f64,

    /// Edge length of the square room [m]
    #[arg(long, default_value_t = 10.0)]
    room_size: f64,

    /// Forward steps per side
    #[arg(long, default_value_t = 8)]
    side_steps: usize,

    /// Number of sides to drive
    #[arg(long, default_value_t = 4)]
    sides: usize,

    /// Distance of one forward step [m]
    #[arg(long, default_value_t = 1.0)]
    step_distance: f64,

    /// Turn at each corner [deg]; negative turns right
    #[arg(long, default_value_t = 90.0, allow_negative_numbers = true)]
    turn_deg: f64,

    /// Seed of the filter's random stream
    #[arg(long)]
    seed: Option<u64>,

    /// Seed of the agent's random stream
    #[arg(long)]
    agent_seed: Option<u64>,

    /// Resampling threshold as a fraction of the population
    #[arg(long, default_value_t = 0.5)]
    resampling_threshold: f64,

    /// Propagate and weight particles on all cores
    #[arg(long)]
    parallel: bool,

    /// Save a trajectory plot to this PNG file
    #[arg(long)]
    plot: Option<String>,

    /// Do not print per-step poses
    #[arg(short, long)]
    quiet: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn scenario(&self) -> ScenarioConfig {
        ScenarioConfig {
            room_size: self.room_size,
            initial_pose: Pose2D::new(self.x, self.y, self.theta),
            side_lengths: vec![self.side_steps; self.sides],
            step_distance: self.step_distance,
            turn_angle: self.turn_deg.to_radians(),
            filter: ParticleFilterConfig {
                num_particles: self.num_particles,
                motion: MotionModelConfig {
                    sigma_pos: self.sigma_pos,
                    sigma_rot: self.sigma_rot,
                },
                sensor: SensorModelConfig {
                    sigma_sense: self.sigma_sense,
                },
                resampling_threshold: self.resampling_threshold,
                seed: self.seed,
                parallel: self.parallel,
            },
            agent_seed: self.agent_seed,
        }
    }
}

fn init_logger(log_level: &str) {
    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    // a second init (e.g. in tests) is harmless
    let _ = builder.try_init();
}

fn plot(
    path: &str,
    config: &ScenarioConfig,
    recorder: &TrajectoryRecorder,
    summary: &ScenarioSummary,
) -> LocalizationResult<()> {
    let environment = Environment::square_room(config.room_size);
    let mut vis = Visualizer::new();
    vis.set_title("Particle Filter Localization")
        .plot_walls(environment.walls())
        .plot_landmarks(environment.landmarks())
        .plot_particles(&summary.final_particles)
        .plot_path(&recorder.true_path(), &PathStyle::new(colors::GROUND_TRUTH, "True"))
        .plot_path(&recorder.estimated_path(), &PathStyle::new(colors::ESTIMATED, "PF"));
    if let Some(last) = recorder.estimates.last() {
        vis.plot_pose(last, &PointStyle::new(colors::ESTIMATED, "Estimate").with_size(1.5));
    }
    if let Some((lo, hi)) = environment.bounds() {
        vis.set_x_range(lo.x - 1.0, hi.x + 1.0).set_y_range(lo.y - 1.0, hi.y + 1.0);
    }
    vis.save_png(path, 800, 800)?;
    info!("Plot saved to: {}", path);
    Ok(())
}

fn run(cli: &Cli) -> LocalizationResult<()> {
    let config = cli.scenario();
    let mut recorder = TrajectoryRecorder::new();

    let summary = if cli.quiet {
        run_square_path(&config, &mut recorder)?
    } else {
        let mut console = ConsoleReporter;
        let mut tee = Tee { first: &mut console, second: &mut recorder };
        run_square_path(&config, &mut tee)?
    };

    println!(
        "Position RMSE: {:.3} m, within 3 sigma_pos: {:.0}% of {} steps, resampled {} times",
        summary.position_rmse(),
        100.0 * summary.fraction_within(3.0 * config.filter.motion.sigma_pos),
        summary.num_steps(),
        summary.resample_count()
    );

    if let Some(path) = &cli.plot {
        plot(path, &config, &recorder, &summary)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
