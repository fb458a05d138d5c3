//! Core compute primitives (Matrix, distances).
//!
//! These types provide the foundation for every clustering algorithm.

pub mod distance;
mod matrix;

pub use distance::DistanceMetric;
pub use matrix::Matrix;
