use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crawjud_cnj::RegionCode;
use crawjud_session::{ApiClient, ApiResponse, HttpError};
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::data::{CaptchaAttempt, CaseResult, ChallengeOptions};
use crate::effects::solver::ImageSolver;
use crate::error::{ChallengeError, Result, SolverError};

const FORBIDDEN: u16 = 403;
const TOKEN_HEADER: &str = "captchatoken";

/// Why a single attempt produced neither an answer nor a new challenge.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("session rejected")]
    Forbidden,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed challenge: {0}")]
    Malformed(&'static str),
}

/// Image and token as last presented by the server.
#[derive(Debug, Clone)]
struct Challenge {
    image: String,
    token: String,
}

impl Challenge {
    fn from_body(body: &Value) -> Option<(String, Option<String>)> {
        let image = body.get("imagem")?.as_str().filter(|s| !s.is_empty())?;
        let token = body.get("tokenDesafio").and_then(Value::as_str).map(str::to_string);
        Some((image.to_string(), token))
    }
}

struct Solved {
    answer: String,
    token: String,
    metadata: Value,
}

/// Solves the image challenge guarding `/processos/<id>`.
///
/// The challenge is fetched once per case. A wrong guess is answered by the
/// server with the next image (and usually a new token), which replaces the
/// cached one; the loop never re-fetches `/captcha` on its own. Every
/// submission, failed request or undecodable reply uses up one attempt, and a
/// 403 ends the case immediately.
pub struct ChallengeResolver<S> {
    solver: S,
    options: ChallengeOptions,
}

impl<S: ImageSolver> ChallengeResolver<S> {
    pub fn new(solver: S, options: ChallengeOptions) -> Self {
        Self { solver, options }
    }

    pub fn options(&self) -> &ChallengeOptions {
        &self.options
    }

    pub fn resolve(
        &self,
        client: &dyn ApiClient,
        region: &RegionCode,
        case_number: &str,
        process_id: &str,
    ) -> Result<CaseResult> {
        let max_attempts = self.options.max_attempts;
        let mut current: Option<Challenge> = None;

        for attempt in 1..=max_attempts {
            match self.attempt(client, process_id, &mut current, attempt) {
                Ok(Some(solved)) => {
                    tracing::info!(case = case_number, attempt, "challenge solved");
                    return Ok(CaseResult {
                        case_number: case_number.to_string(),
                        process_internal_id: process_id.to_string(),
                        access_token: solved.token,
                        answer: solved.answer,
                        raw_metadata: solved.metadata,
                        region_code: region.clone(),
                    });
                }
                Ok(None) => tracing::debug!(case = case_number, attempt, "wrong guess"),
                Err(AttemptError::Forbidden) => {
                    tracing::warn!(case = case_number, attempt, "session rejected by challenge endpoint");
                    return Err(ChallengeError::SessionRejected {
                        case: case_number.to_string(),
                        attempt,
                    });
                }
                Err(e) => tracing::warn!(case = case_number, attempt, error = %e, "challenge attempt failed"),
            }

            if attempt < max_attempts {
                self.backoff();
            }
        }

        Err(ChallengeError::Exhausted {
            case: case_number.to_string(),
            attempts: max_attempts,
        })
    }

    fn attempt(
        &self,
        client: &dyn ApiClient,
        process_id: &str,
        current: &mut Option<Challenge>,
        attempt: u32,
    ) -> std::result::Result<Option<Solved>, AttemptError> {
        let challenge = match current {
            Some(challenge) => challenge.clone(),
            None => {
                let fetched = self.fetch(client, process_id)?;
                *current = Some(fetched.clone());
                fetched
            }
        };

        let captcha = CaptchaAttempt {
            process_id: process_id.to_string(),
            image: decode_image(&challenge.image)?,
            challenge_token: challenge.token,
            attempt_count: attempt,
        };
        let answer = self.solver.solve(&captcha.image)?;

        let path = format!(
            "/processos/{}?tokenDesafio={}&resposta={}",
            captcha.process_id,
            urlencoding::encode(&captcha.challenge_token),
            urlencoding::encode(&answer),
        );
        let response = client.get(&path, Some(self.options.request_timeout()))?;
        check_status(&response)?;

        let token = response.header(TOKEN_HEADER).unwrap_or_default().to_string();
        let body = last_element(response.json()?);

        match Challenge::from_body(&body) {
            Some((image, next_token)) => {
                *current = Some(Challenge {
                    image,
                    token: next_token.unwrap_or(captcha.challenge_token),
                });
                Ok(None)
            }
            None => Ok(Some(Solved {
                answer,
                token,
                metadata: body,
            })),
        }
    }

    fn fetch(&self, client: &dyn ApiClient, process_id: &str) -> std::result::Result<Challenge, AttemptError> {
        let path = format!("/captcha?idProcesso={}", urlencoding::encode(process_id));
        let response = client.get(&path, Some(self.options.request_timeout()))?;
        check_status(&response)?;

        let body = last_element(response.json()?);
        let (image, token) = Challenge::from_body(&body).ok_or(AttemptError::Malformed("no image"))?;
        let token = token.ok_or(AttemptError::Malformed("no challenge token"))?;
        Ok(Challenge { image, token })
    }

    fn backoff(&self) {
        let secs = rand::rng().random_range(self.options.backoff_range());
        if secs > 0 {
            thread::sleep(Duration::from_secs(secs));
        }
    }
}

fn check_status(response: &ApiResponse) -> std::result::Result<(), AttemptError> {
    match response.status() {
        FORBIDDEN => Err(AttemptError::Forbidden),
        _ if response.is_success() => Ok(()),
        status => Err(AttemptError::Status(status)),
    }
}

fn last_element(body: Value) -> Value {
    match body {
        Value::Array(mut items) => items.pop().unwrap_or(Value::Null),
        other => other,
    }
}

fn decode_image(encoded: &str) -> std::result::Result<Vec<u8>, SolverError> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}
