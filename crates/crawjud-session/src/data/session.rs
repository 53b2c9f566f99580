use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use crawjud_cnj::RegionCode;
use serde::{Deserialize, Serialize};

/// Authenticated HTTP context of one region for the lifetime of one batch.
///
/// Built once by the authenticator and shared read-only by every case worker
/// of the region. Never persisted and never reused by a later batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub region_code: RegionCode,
    pub cookies: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub base_url: String,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    /// Value for a single `Cookie` request header, or `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }
}

/// Stages of the certificate SSO handshake.
///
/// `Idle → NavigatingLogin → AwaitingSsoRedirect → ValidatingSession`, ending
/// in `Authenticated`, `TimedOut` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Idle,
    NavigatingLogin,
    AwaitingSsoRedirect,
    ValidatingSession,
    Authenticated,
    TimedOut,
    Failed,
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::TimedOut | Self::Failed)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::NavigatingLogin => "navigating to login",
            Self::AwaitingSsoRedirect => "awaiting SSO redirect",
            Self::ValidatingSession => "validating session",
            Self::Authenticated => "authenticated",
            Self::TimedOut => "timed out",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Fixed URL templates of a regional PJe instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PjeUrls {
    host: String,
}

impl PjeUrls {
    /// Path fragment present on every page after a successful login.
    pub const POST_LOGIN_FRAGMENT: &'static str = "pjekz";
    /// Intermediate panel whose cookies only settle after a reload.
    pub const EXTERNAL_USER_PANEL: &'static str = "pjekz/painel/usuario-externo";

    pub fn for_region(region: &RegionCode) -> Self {
        Self {
            host: format!("https://pje.trt{region}.jus.br"),
        }
    }

    pub fn login(&self) -> String {
        format!("{}/primeirograu/login.seam", self.host)
    }

    pub fn validated(&self) -> String {
        format!("{}/pjekz/", self.host)
    }

    pub fn search(&self) -> String {
        format!("{}/consultaprocessual/", self.host)
    }

    /// Prefix of the internal API whose requests carry the replay headers.
    pub fn internal_api(&self) -> String {
        format!("{}/pje-comum-api/", self.host)
    }

    /// Root every authenticated request is resolved against.
    pub fn api_base(&self) -> String {
        format!("{}/pje-consulta-api/api", self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_templates() {
        let urls = PjeUrls::for_region(&RegionCode::from("15"));
        assert_eq!(urls.login(), "https://pje.trt15.jus.br/primeirograu/login.seam");
        assert_eq!(urls.validated(), "https://pje.trt15.jus.br/pjekz/");
        assert_eq!(urls.search(), "https://pje.trt15.jus.br/consultaprocessual/");
        assert_eq!(urls.internal_api(), "https://pje.trt15.jus.br/pje-comum-api/");
        assert_eq!(urls.api_base(), "https://pje.trt15.jus.br/pje-consulta-api/api");
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let ctx = SessionContext {
            region_code: RegionCode::from("1"),
            cookies: BTreeMap::from([
                ("JSESSIONID".to_string(), "abc".to_string()),
                ("access_token".to_string(), "xyz".to_string()),
            ]),
            headers: BTreeMap::new(),
            base_url: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(ctx.cookie_header().as_deref(), Some("JSESSIONID=abc; access_token=xyz"));
    }

    #[test]
    fn terminal_states() {
        assert!(AuthState::Authenticated.is_terminal());
        assert!(AuthState::TimedOut.is_terminal());
        assert!(!AuthState::ValidatingSession.is_terminal());
    }
}
