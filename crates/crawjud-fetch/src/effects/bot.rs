use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crawjud_captcha::{ChallengeOptions, CommandSolver, PjeSearch};
use crawjud_session::{
    AuthOptions, Authenticator, Connector, HttpConnector, SsoAuthenticator, WebDriverFactory, WebDriverOptions,
};
use crawjud_storage::{ObjectStore, StorageOptions, StreamingWriter};

use crate::effects::capability::{Downloader, PjeDownloader, Searcher};
use crate::error::RegistryError;

/// The capabilities one tribunal system needs for a batch.
#[derive(Clone)]
pub struct Bot {
    pub authenticator: Arc<dyn Authenticator>,
    pub connector: Arc<dyn Connector>,
    pub searcher: Arc<dyn Searcher>,
    pub downloader: Arc<dyn Downloader>,
}

/// Everything a bot constructor may draw on.
#[derive(Clone)]
pub struct BotDeps {
    pub auth: AuthOptions,
    pub webdriver: WebDriverOptions,
    pub challenge: ChallengeOptions,
    pub http_timeout: Duration,
    pub storage: StorageOptions,
    pub store: Arc<dyn ObjectStore>,
}

pub type BotConstructor = fn(&BotDeps) -> Result<Bot, RegistryError>;

/// Maps a system name to the constructor of its bot.
///
/// Built once at startup and passed by reference.
#[derive(Clone, Default)]
pub struct BotRegistry {
    constructors: BTreeMap<String, BotConstructor>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every system this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("pje", pje_bot);
        registry
    }

    pub fn register(&mut self, system: impl Into<String>, constructor: BotConstructor) {
        self.constructors.insert(system.into().to_ascii_lowercase(), constructor);
    }

    pub fn systems(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, system: &str, deps: &BotDeps) -> Result<Bot, RegistryError> {
        let constructor = self
            .constructors
            .get(&system.to_ascii_lowercase())
            .ok_or_else(|| RegistryError::UnknownSystem(system.to_string()))?;
        constructor(deps)
    }
}

fn pje_bot(deps: &BotDeps) -> Result<Bot, RegistryError> {
    let factory = WebDriverFactory::new(deps.webdriver.clone())?;
    let solver = CommandSolver::new(&deps.challenge.ocr_command)?;
    let writer = StreamingWriter::new(Arc::clone(&deps.store), &deps.storage);

    Ok(Bot {
        authenticator: Arc::new(SsoAuthenticator::new(factory, deps.auth.clone())),
        connector: Arc::new(HttpConnector::new(deps.http_timeout)),
        searcher: Arc::new(PjeSearch::new(solver, deps.challenge.clone())),
        downloader: Arc::new(PjeDownloader::new(writer, deps.challenge.request_timeout())),
    })
}
