//! Pure transformations: no I/O, no shared state.

mod normalize;
mod partition;

pub use normalize::normalize;
pub use partition::{Partition, partition};
