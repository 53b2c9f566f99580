use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing of the SSO handshake.
///
/// # Examples
///
/// ```
/// use crawjud_session::AuthOptions;
/// use std::time::Duration;
///
/// let options = AuthOptions::default().with_validation_timeout(Duration::from_secs(90));
/// assert_eq!(options.validation_timeout(), Duration::from_secs(90));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    /// How long the browser may take to land on the validated URL.
    ///
    /// Default: 60
    pub validation_timeout_secs: u64,

    /// Upper bound for the SSO button and certificate link to appear.
    ///
    /// Default: 30
    pub element_timeout_secs: u64,

    /// Pause between clicking the SSO button and looking for the certificate link.
    ///
    /// Default: 5000
    pub sso_delay_ms: u64,

    /// Pause after validation before cookies are read.
    ///
    /// Default: 1000
    pub settle_delay_ms: u64,

    /// Interval between current-URL checks while awaiting the redirect.
    ///
    /// Default: 250
    pub poll_interval_ms: u64,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            validation_timeout_secs: 60,
            element_timeout_secs: 30,
            sso_delay_ms: 5000,
            settle_delay_ms: 1000,
            poll_interval_ms: 250,
        }
    }
}

impl AuthOptions {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn sso_delay(&self) -> Duration {
        Duration::from_millis(self.sso_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout_secs = timeout.as_secs();
        self
    }

    /// Zero every delay; used by tests and dry runs against fake drivers.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.sso_delay_ms = 0;
        self.settle_delay_ms = 0;
        self.poll_interval_ms = 1;
        self
    }
}

/// Where the browser automation endpoints live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverOptions {
    /// W3C WebDriver endpoint (chromedriver, selenium grid, ...).
    pub webdriver_url: String,

    /// REST API of the HAR capture proxy.
    pub har_proxy_api: String,

    /// Host the browser uses to reach the capture proxy. Ports are allocated
    /// by the proxy server, one per browser.
    pub har_proxy_host: String,

    pub browser_name: String,

    /// Timeout of every WebDriver and proxy API call.
    pub request_timeout_secs: u64,
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://127.0.0.1:4444".to_string(),
            har_proxy_api: "http://127.0.0.1:8080".to_string(),
            har_proxy_host: "127.0.0.1".to_string(),
            browser_name: "chrome".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl WebDriverOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn proxy_address(&self, port: u16) -> String {
        format!("{}:{port}", self.har_proxy_host)
    }
}
