use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::data::SessionContext;
use crate::error::HttpError;

/// Headers that describe one hop of a captured request and must not be replayed.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "accept-encoding",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-connection",
    "cookie",
];

/// Blocking GET access to a region's API, already carrying the session.
pub trait ApiClient: Send + Sync {
    /// GET `path` relative to the session's API base.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    fn get(&self, path: &str, timeout: Option<Duration>) -> Result<ApiResponse, HttpError>;
}

/// Status, lowercased headers and an unread body.
pub struct ApiResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Box<dyn Read + Send>,
}

impl ApiResponse {
    pub fn new<K, V>(status: u16, headers: impl IntoIterator<Item = (K, V)>, body: Box<dyn Read + Send>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();
        Self { status, headers, body }
    }

    pub fn from_bytes<K, V>(status: u16, headers: impl IntoIterator<Item = (K, V)>, body: impl Into<Vec<u8>>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::new(status, headers, Box::new(Cursor::new(body.into())))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        Ok(serde_json::from_reader(self.body)?)
    }

    pub fn into_body(self) -> Box<dyn Read + Send> {
        self.body
    }
}

impl fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Replays a [`SessionContext`] with `reqwest`'s blocking client.
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn from_session(session: &SessionContext, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .default_headers(replay_headers(session)?)
            .timeout(timeout)
            .build()
            .map_err(HttpError::Build)?;

        Ok(Self {
            client,
            base_url: session.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

impl ApiClient for HttpApiClient {
    fn get(&self, path: &str, timeout: Option<Duration>) -> Result<ApiResponse, HttpError> {
        let url = self.url_for(path);
        let mut request = self.client.get(&url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .map_err(|source| HttpError::Request { url: url.clone(), source })?;

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        tracing::trace!(url = %url, status = response.status().as_u16(), "api response");
        Ok(ApiResponse::new(response.status().as_u16(), headers, Box::new(response)))
    }
}

/// Builds the client a region's workers share.
pub trait Connector: Send + Sync {
    fn connect(&self, session: &SessionContext) -> Result<Arc<dyn ApiClient>, HttpError>;
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for HttpConnector {
    fn connect(&self, session: &SessionContext) -> Result<Arc<dyn ApiClient>, HttpError> {
        Ok(Arc::new(HttpApiClient::from_session(session, self.timeout)?))
    }
}

fn replay_headers(session: &SessionContext) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &session.headers {
        if !is_replayable(name) {
            continue;
        }
        let key = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader { name: name.clone() })?;
        let value = HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader { name: name.clone() })?;
        headers.insert(key, value);
    }

    if let Some(cookie) = session.cookie_header() {
        let value = HeaderValue::from_str(&cookie).map_err(|_| HttpError::InvalidHeader {
            name: COOKIE.as_str().to_string(),
        })?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

/// HTTP/2 pseudo headers and hop-by-hop headers are dropped.
fn is_replayable(name: &str) -> bool {
    !name.starts_with(':') && !HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crawjud_cnj::RegionCode;

    fn session(headers: &[(&str, &str)]) -> SessionContext {
        SessionContext {
            region_code: RegionCode::from("2"),
            cookies: BTreeMap::from([("access_token".to_string(), "abc".to_string())]),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            base_url: "https://pje.trt2.jus.br/pje-consulta-api/api/".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = ApiResponse::from_bytes(
            200,
            [("Content-Type", "application/pdf"), ("Content-Length", " 42 ")],
            Vec::new(),
        );
        assert_eq!(response.content_type(), Some("application/pdf"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/pdf"));
        assert_eq!(response.content_length(), Some(42));
        assert!(response.is_success());
    }

    #[test]
    fn response_json_body() {
        let response = ApiResponse::from_bytes(200, Vec::<(String, String)>::new(), r#"{"id": 7}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let response = ApiResponse::from_bytes(200, Vec::<(String, String)>::new(), "<html>");
        assert!(matches!(response.json::<serde_json::Value>(), Err(HttpError::Json(_))));
    }

    #[test]
    fn drops_pseudo_and_hop_by_hop_headers() {
        let ctx = session(&[
            (":authority", "pje.trt2.jus.br"),
            ("Host", "pje.trt2.jus.br"),
            ("Content-Length", "0"),
            ("Accept-Encoding", "gzip"),
            ("X-XSRF-TOKEN", "token"),
            ("User-Agent", "Mozilla/5.0"),
        ]);
        let headers = replay_headers(&ctx).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers["x-xsrf-token"], "token");
        assert_eq!(headers["user-agent"], "Mozilla/5.0");
        assert_eq!(headers[COOKIE], "access_token=abc");
    }

    #[test]
    fn rejects_unencodable_header() {
        let ctx = session(&[("X-Bad", "line\nbreak")]);
        assert!(matches!(replay_headers(&ctx), Err(HttpError::InvalidHeader { .. })));
    }

    #[test]
    fn joins_paths_against_base() {
        let client = HttpApiClient::from_session(&session(&[]), Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url_for("/processos/dadosbasicos/0001234-56.2024.5.02.0001"),
            "https://pje.trt2.jus.br/pje-consulta-api/api/processos/dadosbasicos/0001234-56.2024.5.02.0001"
        );
        assert_eq!(client.url_for("https://other/x"), "https://other/x");
    }
}
