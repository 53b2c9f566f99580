use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("append to `{key}` at offset {offset} but object has {actual} bytes")]
    OffsetMismatch { key: String, offset: u64, actual: u64 },

    #[error("expected {expected} bytes for `{key}`, source ended after {actual}")]
    ShortRead { key: String, expected: u64, actual: u64 },

    #[error("cannot open storage backend: {0}")]
    Backend(String),

    #[error("object store request for `{key}` failed: {message}")]
    Remote { key: String, message: String },

    #[error("unknown storage backend `{0}`")]
    UnknownBackend(String),

    #[error("I/O on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn remote(key: &str) -> impl FnOnce(String) -> Self + '_ {
        move |message| Self::Remote {
            key: key.to_string(),
            message,
        }
    }

    pub(crate) fn io(key: &str) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("staging file: {0}")]
    Staging(#[source] io::Error),

    #[error("reading document stream: {0}")]
    Source(#[source] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored object `{key}` has {actual:?} bytes, expected {expected}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: Option<u64>,
    },
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
