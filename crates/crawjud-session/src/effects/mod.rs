mod authenticator;
mod client;
mod driver;
mod webdriver;

pub use authenticator::{Authenticator, SsoAuthenticator};
pub use client::{ApiClient, ApiResponse, Connector, HttpApiClient, HttpConnector};
pub use driver::{BrowserCookie, BrowserDriver, DriverFactory, ElementRef};
pub use webdriver::{WebDriverFactory, WebDriverSession};
