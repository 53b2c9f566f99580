mod semaphore;
mod stop;
mod tracker;

pub use semaphore::{Permit, Semaphore};
pub use stop::StopFlag;
pub use tracker::ProgressTracker;
