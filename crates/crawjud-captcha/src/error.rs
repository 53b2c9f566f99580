use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChallengeError>;

/// Terminal outcome of unlocking one case.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("lookup of {case} failed: {reason}")]
    LookupFailed { case: String, reason: String },

    /// The API answered 403; the session is no longer valid for this case.
    #[error("session rejected while resolving {case} (attempt {attempt})")]
    SessionRejected { case: String, attempt: u32 },

    /// The answer budget ran out; the message is what operators see on the progress feed.
    #[error("Erro ao obter informações do processo {case} ({attempts} attempts)")]
    Exhausted { case: String, attempts: u32 },
}

impl ChallengeError {
    pub fn case(&self) -> &str {
        match self {
            Self::LookupFailed { case, .. } | Self::SessionRejected { case, .. } | Self::Exhausted { case, .. } => case,
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("challenge image is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("OCR command is empty")]
    NoCommand,

    #[error("failed to run OCR command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("OCR produced no text")]
    Empty,
}
