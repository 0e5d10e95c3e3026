//! Status reporters receiving (true pose, estimate) once per step

use crate::common::{Path2D, Pose2D, StatusReporter};

/// Prints both poses to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl StatusReporter for ConsoleReporter {
    fn report(&mut self, step: usize, true_pose: &Pose2D, estimate: &Pose2D) {
        println!(
            "[{:3}] Robot state:     x = {:7.3}, y = {:7.3}, theta = {:6.3}",
            step, true_pose.x, true_pose.y, true_pose.yaw
        );
        println!(
            "      Estimated state: x = {:7.3}, y = {:7.3}, theta = {:6.3}",
            estimate.x, estimate.y, estimate.yaw
        );
    }
}

/// Keeps the history of both poses, e.g. for plotting
#[derive(Debug, Default, Clone)]
pub struct TrajectoryRecorder {
    pub true_poses: Vec<Pose2D>,
    pub estimates: Vec<Pose2D>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn true_path(&self) -> Path2D {
        Path2D::from_points(self.true_poses.iter().map(|p| p.position()).collect())
    }

    pub fn estimated_path(&self) -> Path2D {
        Path2D::from_points(self.estimates.iter().map(|p| p.position()).collect())
    }
}

impl StatusReporter for TrajectoryRecorder {
    fn report(&mut self, _step: usize, true_pose: &Pose2D, estimate: &Pose2D) {
        self.true_poses.push(*true_pose);
        self.estimates.push(*estimate);
    }
}

/// Forwards every report to two reporters
pub struct Tee<'a, A: StatusReporter, B: StatusReporter> {
    pub first: &'a mut A,
    pub second: &'a mut B,
}

impl<'a, A: StatusReporter, B: StatusReporter> StatusReporter for Tee<'a, A, B> {
    fn report(&mut self, step: usize, true_pose: &Pose2D, estimate: &Pose2D) {
        self.first.report(step, true_pose, estimate);
        self.second.report(step, true_pose, estimate);
    }
}
