use std::ops::RangeInclusive;
use std::time::Duration;

use crawjud_cnj::RegionCode;
use serde::{Deserialize, Serialize};

/// Unlocked case metadata, ready for caching and the document fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_number: String,
    pub process_internal_id: String,
    /// Value of the `captchatoken` header; authorises the document download.
    pub access_token: String,
    /// The guess that unlocked the metadata.
    pub answer: String,
    pub raw_metadata: serde_json::Value,
    pub region_code: RegionCode,
}

/// One challenge as currently presented by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaAttempt {
    pub process_id: String,
    pub image: Vec<u8>,
    pub challenge_token: String,
    pub attempt_count: u32,
}

/// Bounds of the challenge loop.
///
/// # Examples
///
/// ```
/// use crawjud_captcha::ChallengeOptions;
///
/// let options = ChallengeOptions::default().with_backoff(0, 0);
/// assert_eq!(options.max_attempts, 15);
/// assert_eq!(options.backoff_range(), 0..=0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeOptions {
    /// Submissions allowed per case.
    pub max_attempts: u32,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    pub request_timeout_secs: u64,
    /// Program and arguments of the OCR adapter; the image goes to stdin.
    pub ocr_command: Vec<String>,
}

impl Default for ChallengeOptions {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            backoff_min_secs: 3,
            backoff_max_secs: 7,
            request_timeout_secs: 60,
            ocr_command: ["tesseract", "stdin", "stdout", "--psm", "7"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ChallengeOptions {
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.backoff_min_secs = min_secs;
        self.backoff_max_secs = max_secs;
        self
    }

    pub fn backoff_range(&self) -> RangeInclusive<u64> {
        self.backoff_min_secs..=self.backoff_max_secs.max(self.backoff_min_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
