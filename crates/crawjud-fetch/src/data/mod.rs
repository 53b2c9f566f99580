mod options;
mod outcome;
mod progress;

pub use options::PoolOptions;
pub use outcome::{BatchReport, DownloadOutcome, destination_key};
pub use progress::{EventType, LOG_EVENT, ProgressEvent};
