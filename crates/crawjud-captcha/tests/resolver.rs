use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crawjud_captcha::{ChallengeError, ChallengeOptions, ChallengeResolver, PjeSearch, SolverError};
use crawjud_cnj::RegionCode;
use crawjud_session::{ApiClient, ApiResponse, HttpError};

const CASE: &str = "0001234-56.2024.5.02.0001";

/// Serves `/captcha` and `/processos/...` from two scripted queues.
#[derive(Default)]
struct ScriptedApi {
    lookups: Mutex<VecDeque<Reply>>,
    challenges: Mutex<VecDeque<Reply>>,
    submissions: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
}

enum Reply {
    Json(u16, &'static str),
    JsonWithToken(&'static str, &'static str),
    Broken,
}

impl ScriptedApi {
    fn challenge(self, reply: Reply) -> Self {
        self.challenges.lock().unwrap().push_back(reply);
        self
    }

    fn lookup(self, reply: Reply) -> Self {
        self.lookups.lock().unwrap().push_back(reply);
        self
    }

    fn submission(self, reply: Reply) -> Self {
        self.submissions.lock().unwrap().push_back(reply);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl ApiClient for ScriptedApi {
    fn get(&self, path: &str, _: Option<Duration>) -> Result<ApiResponse, HttpError> {
        self.calls.lock().unwrap().push(path.to_string());
        let queue = if path.starts_with("/captcha") {
            &self.challenges
        } else if path.starts_with("/processos/dadosbasicos/") {
            &self.lookups
        } else {
            &self.submissions
        };
        let reply = queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Json(200, r#"{"imagem": "d3Jvbmc=", "tokenDesafio": "again"}"#));

        match reply {
            Reply::Json(status, body) => Ok(ApiResponse::from_bytes(status, [("content-type", "application/json")], body)),
            Reply::JsonWithToken(body, token) => Ok(ApiResponse::from_bytes(
                200,
                [("Content-Type", "application/json"), ("CaptchaToken", token)],
                body,
            )),
            Reply::Broken => Err(HttpError::Transport("connection reset".to_string())),
        }
    }
}

fn guess(_: &[u8]) -> Result<String, SolverError> {
    Ok("ab12cd".to_string())
}

fn options() -> ChallengeOptions {
    ChallengeOptions::default().with_backoff(0, 0)
}

fn resolve(api: &ScriptedApi) -> crawjud_captcha::Result<crawjud_captcha::CaseResult> {
    ChallengeResolver::new(guess, options()).resolve(api, &RegionCode::from("2"), CASE, "5500")
}

const FIRST: &str = r#"{"imagem": "Zmlyc3Q=", "tokenDesafio": "t1"}"#;

#[test]
fn solves_after_wrong_guess_with_rotated_token() {
    let api = ScriptedApi::default()
        .challenge(Reply::Json(200, FIRST))
        .submission(Reply::Json(200, r#"{"imagem": "c2Vjb25k", "tokenDesafio": "t2"}"#))
        .submission(Reply::JsonWithToken(r#"{"numero": "0001234", "classe": "ATOrd"}"#, "ct-9"));

    let result = resolve(&api).unwrap();

    assert_eq!(result.access_token, "ct-9");
    assert_eq!(result.answer, "ab12cd");
    assert_eq!(result.process_internal_id, "5500");
    assert_eq!(result.raw_metadata["classe"], "ATOrd");
    assert_eq!(
        api.calls(),
        [
            "/captcha?idProcesso=5500",
            "/processos/5500?tokenDesafio=t1&resposta=ab12cd",
            "/processos/5500?tokenDesafio=t2&resposta=ab12cd",
        ]
    );
}

#[test]
fn first_challenge_is_reused_when_server_does_not_rotate_token() {
    let api = ScriptedApi::default()
        .challenge(Reply::Json(200, FIRST))
        .submission(Reply::Json(200, r#"{"imagem": "c2Vjb25k"}"#))
        .submission(Reply::JsonWithToken(r#"{"numero": "1"}"#, "ct"));

    resolve(&api).unwrap();
    let calls = api.calls();
    assert_eq!(calls[2], "/processos/5500?tokenDesafio=t1&resposta=ab12cd");
    assert_eq!(api.count("/captcha"), 1);
}

#[test]
fn forbidden_on_third_attempt_is_session_rejected() {
    let api = ScriptedApi::default()
        .challenge(Reply::Json(200, FIRST))
        .submission(Reply::Json(200, FIRST))
        .submission(Reply::Json(200, FIRST))
        .submission(Reply::Json(403, "{}"));

    let err = resolve(&api).unwrap_err();

    assert!(matches!(err, ChallengeError::SessionRejected { attempt: 3, .. }));
    assert_eq!(api.count("/processos/5500?"), 3);
}

#[test]
fn never_submits_more_than_budget() {
    let api = ScriptedApi::default().challenge(Reply::Json(200, FIRST));

    let err = resolve(&api).unwrap_err();

    assert!(matches!(err, ChallengeError::Exhausted { attempts: 15, .. }));
    assert!(err.to_string().starts_with("Erro ao obter informações do processo"));
    assert_eq!(api.count("/processos/5500?"), 15);
    assert_eq!(api.count("/captcha"), 1);
}

#[test]
fn transport_errors_consume_attempts() {
    let api = ScriptedApi::default()
        .challenge(Reply::Broken)
        .challenge(Reply::Json(200, FIRST))
        .submission(Reply::Broken)
        .submission(Reply::Json(200, "<html>"))
        .submission(Reply::JsonWithToken("[{\"imagem\": \"x\"}, {\"numero\": \"1\"}]", "ct"));

    let resolver = ChallengeResolver::new(guess, options().with_max_attempts(4));
    let result = resolver.resolve(&api, &RegionCode::from("2"), CASE, "5500").unwrap();

    assert_eq!(result.raw_metadata["numero"], "1");
    assert_eq!(api.count("/captcha"), 2);
    assert_eq!(api.count("/processos/5500?"), 3);
}

#[test]
fn budget_includes_failed_attempts() {
    let api = ScriptedApi::default()
        .challenge(Reply::Broken)
        .challenge(Reply::Broken)
        .challenge(Reply::Broken);

    let resolver = ChallengeResolver::new(guess, options().with_max_attempts(3));
    let err = resolver.resolve(&api, &RegionCode::from("2"), CASE, "5500").unwrap_err();

    assert!(matches!(err, ChallengeError::Exhausted { attempts: 3, .. }));
    assert_eq!(api.count("/processos/5500?"), 0);
}

#[test]
fn search_chains_lookup_and_challenge() {
    let api = ScriptedApi::default()
        .lookup(Reply::Json(200, r#"[{"id": 5500, "classe": "ATOrd"}]"#))
        .challenge(Reply::Json(200, FIRST))
        .submission(Reply::JsonWithToken(r#"{"numero": "1"}"#, "ct"));

    let search = PjeSearch::new(guess, options());
    let result = search.search(&api, &RegionCode::from("2"), CASE).unwrap();

    assert_eq!(result.region_code, RegionCode::from("2"));
    assert_eq!(result.case_number, CASE);
    assert_eq!(api.calls()[0], format!("/processos/dadosbasicos/{CASE}"));
}

#[test]
fn search_stops_when_lookup_is_forbidden() {
    let api = ScriptedApi::default().lookup(Reply::Json(403, "{}"));

    let err = PjeSearch::new(guess, options())
        .search(&api, &RegionCode::from("2"), CASE)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::LookupFailed { .. }));
    assert_eq!(api.count("/captcha"), 0);
}

#[test]
fn token_and_answer_are_percent_encoded() {
    let api = ScriptedApi::default()
        .challenge(Reply::Json(200, r#"{"imagem": "Zmlyc3Q=", "tokenDesafio": "a+b/c="}"#))
        .submission(Reply::JsonWithToken(r#"{"numero": "1"}"#, "ct"));
    let spaced = |_: &[u8]| -> Result<String, SolverError> { Ok("x y&z".to_string()) };

    ChallengeResolver::new(spaced, options())
        .resolve(&api, &RegionCode::from("2"), CASE, "55 00")
        .unwrap();

    let calls = api.calls();
    assert_eq!(calls[0], "/captcha?idProcesso=55%2000");
    assert_eq!(calls[1], "/processos/55 00?tokenDesafio=a%2Bb%2Fc%3D&resposta=x%20y%26z");

    let query = calls[1].split_once("tokenDesafio=").unwrap().1;
    let (token, answer) = query.split_once("&resposta=").unwrap();
    assert_eq!(urlencoding::decode(token).unwrap(), "a+b/c=");
    assert_eq!(urlencoding::decode(answer).unwrap(), "x y&z");
}
