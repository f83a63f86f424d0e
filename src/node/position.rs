//! On-screen coordinates, kept only to measure packet transit distance.

use serde::{Deserialize, Serialize};

/// A point in the 2-D plane the cluster is laid out on.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}
