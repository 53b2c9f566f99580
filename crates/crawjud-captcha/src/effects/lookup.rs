use std::time::Duration;

use crawjud_session::ApiClient;
use serde_json::Value;

use crate::error::{ChallengeError, Result};

const FORBIDDEN: u16 = 403;

/// Resolves a case number to the tribunal's internal process id through
/// `GET /processos/dadosbasicos/<case_number>`.
#[derive(Debug, Clone)]
pub struct ProcessLookup {
    timeout: Duration,
}

impl ProcessLookup {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn process_id(&self, client: &dyn ApiClient, case_number: &str) -> Result<String> {
        let failed = |reason: String| ChallengeError::LookupFailed {
            case: case_number.to_string(),
            reason,
        };

        let path = format!("/processos/dadosbasicos/{case_number}");
        let response = client
            .get(&path, Some(self.timeout))
            .map_err(|e| failed(e.to_string()))?;

        match response.status() {
            FORBIDDEN => return Err(failed("access forbidden".to_string())),
            status if !response.is_success() => return Err(failed(format!("status {status}"))),
            _ => {}
        }

        let body: Value = response.json().map_err(|e| failed(e.to_string()))?;
        let record = match body {
            Value::Array(items) => items.into_iter().next().ok_or_else(|| failed("no process found".to_string()))?,
            other => other,
        };

        match record.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(failed("response has no process id".to_string())),
        }
    }
}

impl Default for ProcessLookup {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
