use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::Har;
use crate::error::DriverError;

/// Opaque handle to an element found by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub id: String,
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// A live browser session with traffic capture.
///
/// All calls block. Implementations own the remote session and release it in
/// [`BrowserDriver::quit`]; callers quit exactly once, on every path.
pub trait BrowserDriver {
    fn get(&mut self, url: &str) -> Result<(), DriverError>;

    fn current_url(&mut self) -> Result<String, DriverError>;

    fn refresh(&mut self) -> Result<(), DriverError>;

    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Poll for the first element matching a CSS selector.
    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<ElementRef, DriverError>;

    fn click(&mut self, element: &ElementRef) -> Result<(), DriverError>;

    fn attribute(&mut self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError>;

    fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError>;

    /// Every request/response pair captured since the session opened, in order.
    fn captured_traffic(&mut self) -> Result<Har, DriverError>;

    fn quit(&mut self) -> Result<(), DriverError>;
}

/// Opens a fresh browser per authentication.
pub trait DriverFactory: Send + Sync {
    type Driver: BrowserDriver;

    fn open(&self) -> Result<Self::Driver, DriverError>;
}
