//! Subset of the HTTP Archive 1.2 format produced by capture proxies.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub pageref: Option<String>,
    #[serde(default)]
    pub started_date_time: String,
    pub request: HarRequest,
    pub response: HarResponse,
}

impl HarEntry {
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.started_date_time).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    #[serde(default)]
    pub cookies: Vec<HarNameValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    #[serde(default)]
    pub content: HarContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarNameValue {
    pub name: String,
    pub value: String,
}

impl HarNameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Har {
    /// Most recent entry whose request URL starts with `prefix`.
    ///
    /// Entries with a parseable `startedDateTime` are ordered by it; ties and
    /// unparseable timestamps fall back to capture order.
    pub fn latest_request_to(&self, prefix: &str) -> Option<&HarEntry> {
        self.log
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.request.url.starts_with(prefix))
            .max_by_key(|(i, e)| (e.started_at(), *i))
            .map(|(_, e)| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = r#"{
      "log": {
        "entries": [
          {
            "pageref": "page_1",
            "startedDateTime": "2025-03-01T10:00:02.000-03:00",
            "request": {
              "method": "GET",
              "url": "https://pje.trt2.jus.br/pje-comum-api/api/usuario",
              "headers": [{"name": "X-XSRF-TOKEN", "value": "new"}],
              "cookies": []
            },
            "response": {"status": 200, "headers": [], "content": {"size": 10, "mimeType": "application/json"}}
          },
          {
            "startedDateTime": "2025-03-01T10:00:01.000-03:00",
            "request": {
              "method": "GET",
              "url": "https://pje.trt2.jus.br/pje-comum-api/api/config",
              "headers": [{"name": "X-XSRF-TOKEN", "value": "old"}]
            },
            "response": {"status": 200}
          },
          {
            "startedDateTime": "2025-03-01T10:00:03.000-03:00",
            "request": {"method": "GET", "url": "https://sso.cloud.pje.jus.br/auth"},
            "response": {"status": 302}
          }
        ]
      }
    }"#;

    #[test]
    fn parses_browser_capture() {
        let har: Har = serde_json::from_str(CAPTURE).unwrap();
        assert_eq!(har.log.entries.len(), 3);
        assert_eq!(har.log.entries[0].pageref.as_deref(), Some("page_1"));
        assert_eq!(har.log.entries[0].response.content.mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn latest_request_uses_timestamps() {
        let har: Har = serde_json::from_str(CAPTURE).unwrap();
        let entry = har.latest_request_to("https://pje.trt2.jus.br/pje-comum-api/").unwrap();
        assert_eq!(entry.request.headers[0].value, "new");
    }

    #[test]
    fn latest_request_without_match() {
        let har: Har = serde_json::from_str(CAPTURE).unwrap();
        assert!(har.latest_request_to("https://pje.trt3.jus.br/").is_none());
    }
}
