//! Static map: boundary walls and range landmarks

use crate::common::{Point2D, Wall};

/// Immutable environment. The filter only reads the landmarks; the walls are
/// kept for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    walls: Vec<Wall>,
    landmarks: Vec<Point2D>,
}

impl Environment {
    pub fn new(walls: Vec<Wall>, landmarks: Vec<Point2D>) -> Self {
        Self { walls, landmarks }
    }

    /// `size` x `size` room with its lower-left corner at the origin and a
    /// landmark in every corner
    pub fn square_room(size: f64) -> Self {
        let corners = [
            Point2D::new(0.0, 0.0),
            Point2D::new(size, 0.0),
            Point2D::new(size, size),
            Point2D::new(0.0, size),
        ];
        let walls = (0..corners.len())
            .map(|i| Wall::new(corners[i], corners[(i + 1) % corners.len()]))
            .collect();
        let landmarks = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, size),
            Point2D::new(size, size),
            Point2D::new(size, 0.0),
        ];
        Self { walls, landmarks }
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn landmarks(&self) -> &[Point2D] {
        &self.landmarks
    }

    /// Axis-aligned bounds ((min_x, min_y), (max_x, max_y)) of walls and landmarks
    pub fn bounds(&self) -> Option<(Point2D, Point2D)> {
        let mut points = self
            .walls
            .iter()
            .flat_map(|w| [w.start, w.end])
            .chain(self.landmarks.iter().copied());
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (
                Point2D::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point2D::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::square_room(10.0)
    }
}
