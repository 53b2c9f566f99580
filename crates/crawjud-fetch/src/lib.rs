//! Retrieval of a batch of PJe cases.
//!
//! # Architecture
//!
//! - `data` - Outcomes, batch report, progress payloads, pool widths
//! - `core` - Counting semaphore, stop flag, progress counters
//! - `effects` - Capabilities, bot registry, reporters and the orchestrator
//!
//! A batch is partitioned by region. Up to `regions` regions run at once, each
//! authenticating once and then running up to `cases_per_region` cases at once.
//! Every case that unlocks its metadata caches it before a document-fetch
//! thread streams the full-text PDF into object storage.

mod core;
mod data;
mod effects;
mod error;

pub use self::core::{Permit, ProgressTracker, Semaphore, StopFlag};
pub use data::{BatchReport, DownloadOutcome, EventType, LOG_EVENT, PoolOptions, ProgressEvent, destination_key};
pub use effects::{
    Bot, BotConstructor, BotDeps, BotRegistry, ChannelReporter, Document, Downloader, Orchestrator, PjeDownloader,
    ProgressReporter, RoutedEvent, Searcher, TracingReporter,
};
pub use error::{DocumentError, ErrorKind, RegistryError};

pub use crawjud_session::{Authenticator, Connector};
