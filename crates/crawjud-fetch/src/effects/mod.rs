mod bot;
mod capability;
mod orchestrator;
mod reporter;

pub use bot::{Bot, BotConstructor, BotDeps, BotRegistry};
pub use capability::{Document, Downloader, PjeDownloader, Searcher};
pub use orchestrator::Orchestrator;
pub use reporter::{ChannelReporter, ProgressReporter, RoutedEvent, TracingReporter};
