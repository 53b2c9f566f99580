use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crawjud_cnj::RegionCode;

use crate::data::{AuthOptions, AuthState, PjeUrls, SessionContext};
use crate::effects::driver::{BrowserDriver, DriverFactory};
use crate::error::{AuthCause, AuthError, DriverError};

const SSO_BUTTON: &str = r#"button[id="btnSsoPdpj"]"#;
const CERTIFICATE_LINK: &str = r#"div[class="certificado"] > a"#;

/// Produces an authenticated context for a region.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, region: &RegionCode) -> Result<SessionContext, AuthError>;
}

/// Certificate-based SSO driven through a browser with traffic capture.
///
/// A new browser is opened for every call and always quit before returning.
/// Failures are never retried here.
pub struct SsoAuthenticator<F: DriverFactory> {
    factory: F,
    options: AuthOptions,
}

impl<F: DriverFactory> SsoAuthenticator<F> {
    pub fn new(factory: F, options: AuthOptions) -> Self {
        Self { factory, options }
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    fn handshake(
        &self,
        region: &RegionCode,
        driver: &mut F::Driver,
        urls: &PjeUrls,
        state: &mut AuthState,
    ) -> Result<SessionContext, AuthCause> {
        advance(region, state, AuthState::NavigatingLogin);
        driver.get(&urls.login())?;

        let button = driver.wait_for_element(SSO_BUTTON, self.options.element_timeout())?;
        driver.click(&button)?;
        pause(self.options.sso_delay());

        let link = driver.wait_for_element(CERTIFICATE_LINK, self.options.element_timeout())?;
        let onclick = driver
            .attribute(&link, "onclick")?
            .ok_or_else(|| DriverError::MissingAttribute {
                selector: CERTIFICATE_LINK.to_string(),
                attribute: "onclick".to_string(),
            })?;
        driver.execute_script(&onclick)?;

        advance(region, state, AuthState::AwaitingSsoRedirect);
        self.await_validation(driver, &urls.validated())?;

        advance(region, state, AuthState::ValidatingSession);
        pause(self.options.settle_delay());
        let current = driver.current_url()?;
        if current.contains(PjeUrls::EXTERNAL_USER_PANEL) {
            tracing::debug!(region = %region, url = %current, "reloading external user panel");
            driver.refresh()?;
        }

        let cookies: BTreeMap<String, String> = driver
            .cookies()?
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();

        let api = urls.internal_api();
        let traffic = driver.captured_traffic()?;
        let replay = traffic
            .latest_request_to(&api)
            .ok_or_else(|| AuthCause::NoReplayRequest { host: api.clone() })?;
        let headers: BTreeMap<String, String> = replay
            .request
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();

        Ok(SessionContext {
            region_code: region.clone(),
            cookies,
            headers,
            base_url: urls.api_base(),
            created_at: Utc::now(),
        })
    }

    /// Wait for the browser to land on `target`.
    ///
    /// Past the deadline the login still counts if the browser made it to a
    /// post-login page other than the exact validated URL.
    fn await_validation(&self, driver: &mut F::Driver, target: &str) -> Result<String, AuthCause> {
        let timeout = self.options.validation_timeout();
        let deadline = Instant::now() + timeout;

        loop {
            let current = driver.current_url()?;
            if current == target {
                return Ok(current);
            }
            if Instant::now() >= deadline {
                if current.contains(PjeUrls::POST_LOGIN_FRAGMENT) {
                    tracing::warn!(url = %current, "validation URL not reached, continuing from post-login page");
                    return Ok(current);
                }
                return Err(AuthCause::TimedOut { timeout, url: current });
            }
            thread::sleep(self.options.poll_interval());
        }
    }
}

impl<F: DriverFactory> Authenticator for SsoAuthenticator<F> {
    fn authenticate(&self, region: &RegionCode) -> Result<SessionContext, AuthError> {
        let urls = PjeUrls::for_region(region);
        let mut state = AuthState::Idle;

        let mut driver = self
            .factory
            .open()
            .map_err(|e| AuthError::new(region.clone(), state, e))?;

        let result = self.handshake(region, &mut driver, &urls, &mut state);

        if let Err(e) = driver.quit() {
            tracing::warn!(region = %region, error = %e, "failed to quit browser");
        }

        match result {
            Ok(session) => {
                advance(region, &mut state, AuthState::Authenticated);
                tracing::info!(
                    region = %region,
                    cookies = session.cookies.len(),
                    headers = session.headers.len(),
                    "session established"
                );
                Ok(session)
            }
            Err(cause) => {
                let failed_in = state;
                let terminal = if matches!(cause, AuthCause::TimedOut { .. }) {
                    AuthState::TimedOut
                } else {
                    AuthState::Failed
                };
                advance(region, &mut state, terminal);
                Err(AuthError::new(region.clone(), failed_in, cause))
            }
        }
    }
}

fn advance(region: &RegionCode, state: &mut AuthState, next: AuthState) {
    tracing::debug!(region = %region, from = %state, to = %next, "auth state");
    *state = next;
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::data::{Har, HarEntry, HarLog, HarNameValue, HarRequest, HarResponse};
    use crate::effects::driver::{BrowserCookie, ElementRef};

    #[derive(Default)]
    struct Script {
        urls: VecDeque<String>,
        last_url: String,
        entries: Vec<HarEntry>,
        visited: Vec<String>,
        scripts: Vec<String>,
        refreshed: u32,
        quits: u32,
    }

    struct FakeDriver(Arc<Mutex<Script>>);

    impl BrowserDriver for FakeDriver {
        fn get(&mut self, url: &str) -> Result<(), DriverError> {
            self.0.lock().unwrap().visited.push(url.to_string());
            Ok(())
        }

        fn current_url(&mut self) -> Result<String, DriverError> {
            let mut s = self.0.lock().unwrap();
            if let Some(next) = s.urls.pop_front() {
                s.last_url = next;
            }
            Ok(s.last_url.clone())
        }

        fn refresh(&mut self) -> Result<(), DriverError> {
            self.0.lock().unwrap().refreshed += 1;
            Ok(())
        }

        fn execute_script(&mut self, script: &str) -> Result<serde_json::Value, DriverError> {
            self.0.lock().unwrap().scripts.push(script.to_string());
            Ok(serde_json::Value::Null)
        }

        fn wait_for_element(&mut self, selector: &str, _: Duration) -> Result<ElementRef, DriverError> {
            Ok(ElementRef {
                id: "e1".to_string(),
                selector: selector.to_string(),
            })
        }

        fn click(&mut self, _: &ElementRef) -> Result<(), DriverError> {
            Ok(())
        }

        fn attribute(&mut self, _: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
            Ok((name == "onclick").then(|| "loginCertificado()".to_string()))
        }

        fn cookies(&mut self) -> Result<Vec<BrowserCookie>, DriverError> {
            Ok(vec![BrowserCookie {
                name: "access_token".to_string(),
                value: "tok".to_string(),
                domain: None,
                path: None,
            }])
        }

        fn captured_traffic(&mut self) -> Result<Har, DriverError> {
            Ok(Har {
                log: HarLog {
                    entries: self.0.lock().unwrap().entries.clone(),
                },
            })
        }

        fn quit(&mut self) -> Result<(), DriverError> {
            self.0.lock().unwrap().quits += 1;
            Ok(())
        }
    }

    struct FakeFactory(Arc<Mutex<Script>>);

    impl DriverFactory for FakeFactory {
        type Driver = FakeDriver;

        fn open(&self) -> Result<FakeDriver, DriverError> {
            Ok(FakeDriver(Arc::clone(&self.0)))
        }
    }

    fn api_entry(url: &str, token: &str) -> HarEntry {
        HarEntry {
            pageref: None,
            started_date_time: String::new(),
            request: HarRequest {
                method: "GET".to_string(),
                url: url.to_string(),
                headers: vec![HarNameValue::new("X-XSRF-TOKEN", token)],
                cookies: Vec::new(),
            },
            response: HarResponse {
                status: 200,
                headers: Vec::new(),
                content: Default::default(),
            },
        }
    }

    fn authenticator(script: &Arc<Mutex<Script>>, timeout_secs: u64) -> SsoAuthenticator<FakeFactory> {
        let mut options = AuthOptions::default().without_delays();
        options.validation_timeout_secs = timeout_secs;
        SsoAuthenticator::new(FakeFactory(Arc::clone(script)), options)
    }

    #[test]
    fn captures_cookies_and_latest_api_headers() {
        let script = Arc::new(Mutex::new(Script {
            urls: VecDeque::from([
                "https://sso.cloud.pje.jus.br/auth".to_string(),
                "https://pje.trt2.jus.br/pjekz/".to_string(),
            ]),
            entries: vec![
                api_entry("https://pje.trt2.jus.br/pje-comum-api/api/a", "first"),
                api_entry("https://pje.trt2.jus.br/pje-comum-api/api/b", "second"),
                api_entry("https://pje.trt3.jus.br/pje-comum-api/api/c", "other region"),
            ],
            ..Default::default()
        }));

        let session = authenticator(&script, 5).authenticate(&RegionCode::from("2")).unwrap();

        assert_eq!(session.base_url, "https://pje.trt2.jus.br/pje-consulta-api/api");
        assert_eq!(session.cookies.get("access_token").map(String::as_str), Some("tok"));
        assert_eq!(session.headers.get("X-XSRF-TOKEN").map(String::as_str), Some("second"));

        let s = script.lock().unwrap();
        assert_eq!(s.visited, ["https://pje.trt2.jus.br/primeirograu/login.seam"]);
        assert_eq!(s.scripts, ["loginCertificado()"]);
        assert_eq!(s.quits, 1);
        assert_eq!(s.refreshed, 0);
    }

    #[test]
    fn external_user_panel_is_reloaded() {
        let script = Arc::new(Mutex::new(Script {
            urls: VecDeque::from([
                "https://pje.trt2.jus.br/pjekz/".to_string(),
                "https://pje.trt2.jus.br/pjekz/painel/usuario-externo".to_string(),
            ]),
            entries: vec![api_entry("https://pje.trt2.jus.br/pje-comum-api/api/a", "t")],
            ..Default::default()
        }));

        authenticator(&script, 5).authenticate(&RegionCode::from("2")).unwrap();
        assert_eq!(script.lock().unwrap().refreshed, 1);
    }

    #[test]
    fn timeout_outside_post_login_pages_fails() {
        let script = Arc::new(Mutex::new(Script {
            urls: VecDeque::from(["https://sso.cloud.pje.jus.br/auth".to_string()]),
            ..Default::default()
        }));

        let err = authenticator(&script, 0)
            .authenticate(&RegionCode::from("5"))
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.state, AuthState::AwaitingSsoRedirect);
        assert_eq!(err.region, RegionCode::from("5"));
        assert_eq!(script.lock().unwrap().quits, 1);
    }

    #[test]
    fn timeout_on_post_login_page_still_authenticates() {
        let script = Arc::new(Mutex::new(Script {
            urls: VecDeque::from(["https://pje.trt2.jus.br/pjekz/painel".to_string()]),
            entries: vec![api_entry("https://pje.trt2.jus.br/pje-comum-api/api/a", "t")],
            ..Default::default()
        }));

        assert!(authenticator(&script, 0).authenticate(&RegionCode::from("2")).is_ok());
    }

    #[test]
    fn missing_api_traffic_fails_and_quits() {
        let script = Arc::new(Mutex::new(Script {
            urls: VecDeque::from(["https://pje.trt2.jus.br/pjekz/".to_string()]),
            ..Default::default()
        }));

        let err = authenticator(&script, 5)
            .authenticate(&RegionCode::from("2"))
            .unwrap_err();

        assert!(matches!(err.cause, AuthCause::NoReplayRequest { .. }));
        assert_eq!(err.state, AuthState::ValidatingSession);
        assert_eq!(script.lock().unwrap().quits, 1);
    }
}
