pub mod scalar;
pub mod shapes;

pub use scalar::{FixedWide, Scalar, WideScalar};
pub use shapes::{Aabb, Circle, Line, QueryAll, QueryShape, Vec2};
