//! Common types used throughout range_mcl

use nalgebra::Vector3;
use std::f64::consts::PI;

const TWO_PI: f64 = 2.0 * PI;

/// Wrap an angle into [0, 2pi)
pub fn normalize_angle_positive(angle: f64) -> f64 {
    let wrapped = angle % TWO_PI;
    let wrapped = if wrapped < 0.0 { wrapped + TWO_PI } else { wrapped };
    // -1e-17 % 2pi + 2pi rounds up to exactly 2pi
    if wrapped >= TWO_PI {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an angle into [-pi, pi)
pub fn normalize_angle(angle: f64) -> f64 {
    let a = normalize_angle_positive(angle);
    if a >= PI {
        a - TWO_PI
    } else {
        a
    }
}

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 2D pose (position + heading). Heading is kept in [0, 2pi).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    /// Create a pose, wrapping `yaw` into [0, 2pi)
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw: normalize_angle_positive(yaw) }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.yaw)
    }

    /// Euclidean distance between the positions of two poses
    pub fn distance(&self, other: &Pose2D) -> f64 {
        self.position().distance(&other.position())
    }

    /// Smallest signed heading difference `self.yaw - other.yaw`, in [-pi, pi)
    pub fn heading_error(&self, other: &Pose2D) -> f64 {
        normalize_angle(self.yaw - other.yaw)
    }
}

/// Commanded motion for one step: drive `distance` along the current
/// heading, then turn by `rotation`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCommand {
    pub distance: f64,
    pub rotation: f64,
}

impl MotionCommand {
    pub fn new(distance: f64, rotation: f64) -> Self {
        Self { distance, rotation }
    }

    pub fn forward(distance: f64) -> Self {
        Self { distance, rotation: 0.0 }
    }

    pub fn turn(rotation: f64) -> Self {
        Self { distance: 0.0, rotation }
    }

    pub fn zero() -> Self {
        Self { distance: 0.0, rotation: 0.0 }
    }
}

/// Boundary segment of the environment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Point2D,
    pub end: Point2D,
}

impl Wall {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }
}

/// Path represented as a sequence of 2D points
#[derive(Debug, Clone)]
pub struct Path2D {
    pub points: Vec<Point2D>,
}

impl Path2D {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

impl Default for Path2D {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert_relative_eq!(p1.distance(&p2), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_normalize_angle_positive() {
        assert_relative_eq!(normalize_angle_positive(-0.5), TWO_PI - 0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle_positive(TWO_PI + 0.25), 0.25, epsilon = 1e-12);
        assert_eq!(normalize_angle_positive(0.0), 0.0);
        assert_eq!(normalize_angle_positive(TWO_PI), 0.0);
        let tiny = normalize_angle_positive(-1e-18);
        assert!((0.0..TWO_PI).contains(&tiny));
    }

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(TWO_PI - 0.1), -0.1, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(0.1), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pose2d_wraps_yaw() {
        let pose = Pose2D::new(0.0, 0.0, -PI / 2.0);
        assert_relative_eq!(pose.yaw, 1.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_heading_error_across_wrap() {
        let a = Pose2D::new(0.0, 0.0, 0.05);
        let b = Pose2D::new(0.0, 0.0, TWO_PI - 0.05);
        assert_relative_eq!(a.heading_error(&b), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pose2d_to_vector() {
        let v = Pose2D::new(1.0, 2.0, -0.5).to_vector();
        assert_relative_eq!(v[0], 1.0);
        assert_relative_eq!(v[1], 2.0);
        assert_relative_eq!(v[2], TWO_PI - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_path2d_coords() {
        let path = Path2D::from_points(vec![Point2D::new(0.0, 1.0), Point2D::new(2.0, 3.0)]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.x_coords(), vec![0.0, 2.0]);
        assert_eq!(path.y_coords(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_wall_length() {
        let wall = Wall::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0));
        assert_relative_eq!(wall.length(), 10.0);
    }
}
