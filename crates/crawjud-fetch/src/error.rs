use std::fmt;

use crawjud_captcha::{ChallengeError, SolverError};
use crawjud_session::{DriverError, HttpError};
use crawjud_storage::{StoreError, WriteError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a case did not end with both metadata and document stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    AuthFailure,
    ChallengeExhausted,
    SessionRejected,
    LookupFailed,
    /// Metadata was stored but no document could be fetched; not a failure.
    DocumentUnavailable,
    StorageWriteFailure,
    Cancelled,
    /// A worker panicked; the case or region it owned was abandoned.
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::AuthFailure => "auth_failure",
            Self::ChallengeExhausted => "challenge_exhausted",
            Self::SessionRejected => "session_rejected",
            Self::LookupFailed => "lookup_failed",
            Self::DocumentUnavailable => "document_unavailable",
            Self::StorageWriteFailure => "storage_write_failure",
            Self::Cancelled => "cancelled",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ChallengeError> for ErrorKind {
    fn from(err: &ChallengeError) -> Self {
        match err {
            ChallengeError::LookupFailed { .. } => Self::LookupFailed,
            ChallengeError::SessionRejected { .. } => Self::SessionRejected,
            ChallengeError::Exhausted { .. } => Self::ChallengeExhausted,
        }
    }
}

/// Failure of the document-fetch stage of one case.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document request failed: {0}")]
    Fetch(#[from] HttpError),

    #[error("document could not be stored: {0}")]
    Write(#[from] WriteError),
}

impl DocumentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(_) => ErrorKind::DocumentUnavailable,
            Self::Write(_) => ErrorKind::StorageWriteFailure,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no bot registered for system `{0}`")]
    UnknownSystem(String),

    #[error("browser driver: {0}")]
    Driver(#[from] DriverError),

    #[error("image solver: {0}")]
    Solver(#[from] SolverError),

    #[error("object store: {0}")]
    Store(#[from] StoreError),
}
