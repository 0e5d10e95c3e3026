//! Utility modules for range_mcl

pub mod visualization;

pub use visualization::{Visualizer, PathStyle, PointStyle, colors};
