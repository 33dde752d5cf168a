use std::fmt;

use common::shapes::{Aabb, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeError<F> {
    /// Insert position outside the world box.
    OutOfBounds { point: Vec2<F>, bounds: Aabb<F> },
    /// Insert bounding box not fully contained in the world box.
    BoxOutOfBounds { aabb: Aabb<F>, bounds: Aabb<F> },
    /// World box with a non-positive half-extent.
    InvalidBounds { bounds: Aabb<F> },
    /// Leaf capacity of zero.
    InvalidCapacity { capacity: usize },
    /// The node pool grew past what the handle index type can address.
    NodeLimitExceeded { nodes: usize, max: usize },
}

pub type TreeResult<V, F> = Result<V, TreeError<F>>;

impl<F: fmt::Debug> fmt::Display for TreeError<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::OutOfBounds { point, bounds } => {
                write!(
                    f,
                    "point ({:?}, {:?}) is outside the world box centred at ({:?}, {:?}) with half-extents ({:?}, {:?})",
                    point.x, point.y,
                    bounds.center.x, bounds.center.y,
                    bounds.half.x, bounds.half.y
                )
            }
            TreeError::BoxOutOfBounds { aabb, bounds } => {
                write!(
                    f,
                    "box ({:?}, {:?}) +/- ({:?}, {:?}) is not contained in the world box centred at ({:?}, {:?}) with half-extents ({:?}, {:?})",
                    aabb.center.x, aabb.center.y,
                    aabb.half.x, aabb.half.y,
                    bounds.center.x, bounds.center.y,
                    bounds.half.x, bounds.half.y
                )
            }
            TreeError::InvalidBounds { bounds } => {
                write!(
                    f,
                    "world box half-extents must be positive (got ({:?}, {:?}))",
                    bounds.half.x, bounds.half.y
                )
            }
            TreeError::InvalidCapacity { capacity } => {
                write!(f, "leaf capacity must be at least 1 (got {})", capacity)
            }
            TreeError::NodeLimitExceeded { nodes, max } => {
                write!(
                    f,
                    "node pool capacity {} exceeds what the handle index type can address ({})",
                    nodes, max
                )
            }
        }
    }
}

impl<F: fmt::Debug> std::error::Error for TreeError<F> {}
