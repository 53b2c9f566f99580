//! W3C WebDriver client with a BrowserMob-style HAR capture proxy.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};

use crate::data::{Har, WebDriverOptions};
use crate::effects::driver::{BrowserCookie, BrowserDriver, DriverFactory, ElementRef};
use crate::error::DriverError;

/// Key the W3C protocol uses for element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const ELEMENT_POLL: Duration = Duration::from_millis(250);

/// Opens one remote browser and one capture proxy port per call.
pub struct WebDriverFactory {
    options: WebDriverOptions,
    http: Client,
}

impl WebDriverFactory {
    pub fn new(options: WebDriverOptions) -> Result<Self, DriverError> {
        let http = Client::builder().timeout(options.request_timeout()).build()?;
        Ok(Self { options, http })
    }
}

impl DriverFactory for WebDriverFactory {
    type Driver = WebDriverSession;

    fn open(&self) -> Result<WebDriverSession, DriverError> {
        WebDriverSession::start(self.http.clone(), &self.options)
    }
}

pub struct WebDriverSession {
    http: Client,
    endpoint: String,
    proxy_api: String,
    proxy_port: u16,
    closed: bool,
}

impl WebDriverSession {
    fn start(http: Client, options: &WebDriverOptions) -> Result<Self, DriverError> {
        let proxy_api = options.har_proxy_api.trim_end_matches('/').to_string();
        let proxy_port = allocate_proxy(&http, &proxy_api)?;

        match Self::create(&http, options, &proxy_api, proxy_port) {
            Ok(endpoint) => {
                tracing::debug!(endpoint = %endpoint, proxy_port, "browser session opened");
                Ok(Self {
                    http,
                    endpoint,
                    proxy_api,
                    proxy_port,
                    closed: false,
                })
            }
            Err(e) => {
                let _ = release_proxy(&http, &proxy_api, proxy_port);
                Err(e)
            }
        }
    }

    fn create(
        http: &Client,
        options: &WebDriverOptions,
        proxy_api: &str,
        proxy_port: u16,
    ) -> Result<String, DriverError> {
        let har = http
            .put(format!("{proxy_api}/proxy/{proxy_port}/har"))
            .form(&[("captureHeaders", "true"), ("captureCookies", "true")])
            .send()?;
        if !har.status().is_success() {
            return Err(DriverError::Protocol {
                status: har.status().as_u16(),
                message: "capture proxy refused to start recording".to_string(),
            });
        }

        let base = options.webdriver_url.trim_end_matches('/');
        let response = http
            .post(format!("{base}/session"))
            .json(&capabilities(options, proxy_port))
            .send()?;
        let value = unwrap_value(response)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Decode("new session response has no sessionId".to_string()))?;

        Ok(format!("{base}/session/{session_id}"))
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let mut request = self.http.request(method, format!("{}{path}", self.endpoint));
        if let Some(body) = body {
            request = request.json(&body);
        }
        unwrap_value(request.send()?)
    }

    fn find_element(&self, selector: &str) -> Result<Option<ElementRef>, DriverError> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", Some(body)) {
            Ok(value) => {
                let id = element_id(&value)
                    .ok_or_else(|| DriverError::Decode(format!("element reference missing for `{selector}`")))?;
                Ok(Some(ElementRef {
                    id,
                    selector: selector.to_string(),
                }))
            }
            Err(DriverError::Protocol { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl BrowserDriver for WebDriverSession {
    fn get(&mut self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        match self.command(Method::GET, "/url", None)? {
            Value::String(url) => Ok(url),
            other => Err(DriverError::Decode(format!("current url is not a string: {other}"))),
        }
    }

    fn refresh(&mut self) -> Result<(), DriverError> {
        self.command(Method::POST, "/refresh", Some(json!({})))?;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Value, DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<ElementRef, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_element(selector)? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            thread::sleep(ELEMENT_POLL);
        }
    }

    fn click(&mut self, element: &ElementRef) -> Result<(), DriverError> {
        let path = format!("/element/{}/click", element.id);
        self.command(Method::POST, &path, Some(json!({})))?;
        Ok(())
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        let path = format!("/element/{}/attribute/{name}", element.id);
        Ok(self.command(Method::GET, &path, None)?.as_str().map(str::to_string))
    }

    fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError> {
        let value = self.command(Method::GET, "/cookie", None)?;
        serde_json::from_value(value).map_err(|e| DriverError::Decode(e.to_string()))
    }

    fn captured_traffic(&mut self) -> Result<Har, DriverError> {
        let response = self
            .http
            .get(format!("{}/proxy/{}/har", self.proxy_api, self.proxy_port))
            .send()?;
        if !response.status().is_success() {
            return Err(DriverError::Protocol {
                status: response.status().as_u16(),
                message: "capture proxy has no recording".to_string(),
            });
        }
        response.json::<Har>().map_err(DriverError::from)
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let session = self.http.delete(&self.endpoint).send().map_err(DriverError::from);
        let proxy = release_proxy(&self.http, &self.proxy_api, self.proxy_port);
        tracing::debug!(endpoint = %self.endpoint, "browser session closed");
        session.map(drop).and(proxy)
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.quit();
        }
    }
}

fn allocate_proxy(http: &Client, proxy_api: &str) -> Result<u16, DriverError> {
    let response = http
        .post(format!("{proxy_api}/proxy"))
        .form(&[("trustAllServers", "true")])
        .send()?;
    if !response.status().is_success() {
        return Err(DriverError::Protocol {
            status: response.status().as_u16(),
            message: "capture proxy refused to allocate a port".to_string(),
        });
    }
    let body: Value = response.json()?;
    body.get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| DriverError::Decode(format!("capture proxy returned no port: {body}")))
}

fn release_proxy(http: &Client, proxy_api: &str, port: u16) -> Result<(), DriverError> {
    http.delete(format!("{proxy_api}/proxy/{port}")).send()?;
    Ok(())
}

/// Unwrap the `value` member of a WebDriver reply, mapping error replies.
fn unwrap_value(response: Response) -> Result<Value, DriverError> {
    let status = response.status();
    let mut body: Value = response.json()?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }
    let message = value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Err(DriverError::Protocol {
        status: status.as_u16(),
        message,
    })
}

fn capabilities(options: &WebDriverOptions, proxy_port: u16) -> Value {
    let proxy = options.proxy_address(proxy_port);
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": options.browser_name,
                "acceptInsecureCerts": true,
                "proxy": {
                    "proxyType": "manual",
                    "httpProxy": proxy,
                    "sslProxy": proxy,
                },
            }
        }
    })
}

fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}
