use std::time::Duration;

use crawjud_cnj::RegionCode;
use thiserror::Error;

use crate::data::AuthState;

/// Failure reported by a browser-automation backend.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("webdriver returned {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("no element matched `{selector}` within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("element `{selector}` has no `{attribute}` attribute")]
    MissingAttribute { selector: String, attribute: String },

    #[error("unexpected webdriver payload: {0}")]
    Decode(String),

    #[error("webdriver transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Why a region could not be authenticated.
#[derive(Debug, Error)]
pub enum AuthCause {
    #[error("session was not validated within {timeout:?} (browser at {url})")]
    TimedOut { timeout: Duration, url: String },

    #[error("no captured request to {host}")]
    NoReplayRequest { host: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Authentication of one region failed; the region is skipped for the batch.
#[derive(Debug, Error)]
#[error("authentication for TRT{region} failed while {state}: {cause}")]
pub struct AuthError {
    pub region: RegionCode,
    pub state: AuthState,
    #[source]
    pub cause: AuthCause,
}

impl AuthError {
    pub fn new(region: RegionCode, state: AuthState, cause: impl Into<AuthCause>) -> Self {
        Self {
            region,
            state,
            cause: cause.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, AuthCause::TimedOut { .. })
    }
}

/// Failure of a request made with an authenticated session.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("invalid replay header `{name}`")]
    InvalidHeader { name: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response body is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading response body: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport: {0}")]
    Transport(String),
}
