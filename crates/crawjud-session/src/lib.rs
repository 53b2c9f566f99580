//! Regional tribunal authentication and the HTTP context it produces.
//!
//! # Architecture
//!
//! - `data` - Session context, HAR capture model, URL templates, options
//! - `effects` - Browser driving, SSO state machine, authenticated client
//!
//! The browser is only alive for the handshake. Everything after it goes
//! through a plain blocking client rebuilt from the captured cookies and the
//! headers of the last request the browser sent to the tribunal API.

mod data;
mod effects;
mod error;

pub use data::{
    AuthOptions, AuthState, Har, HarContent, HarEntry, HarLog, HarNameValue, HarRequest,
    HarResponse, PjeUrls, SessionContext, WebDriverOptions,
};
pub use effects::{
    ApiClient, ApiResponse, Authenticator, BrowserCookie, BrowserDriver, Connector, DriverFactory,
    ElementRef, HttpApiClient, HttpConnector, SsoAuthenticator, WebDriverFactory, WebDriverSession,
};
pub use error::{AuthCause, AuthError, DriverError, HttpError};
