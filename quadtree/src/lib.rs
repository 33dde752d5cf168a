pub mod box_tree;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod point_tree;
pub mod pool;
mod sort;

pub use box_tree::{BoxHandle, BoxTree};
pub use config::Config;
pub use error::{TreeError, TreeResult};
pub use extract::{Bounded, Extent, ExtentFn, Locate, LocateFn, Positioned, SelfExtent, SelfPosition};
pub use index::TreeIndex;
pub use point_tree::{Handle, PointTree};
pub use pool::Pool;
