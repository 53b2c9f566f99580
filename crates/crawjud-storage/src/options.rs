use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const MIN_CHUNK_SIZE: usize = 64 * 1024;
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Where documents are stored and how they are streamed there.
///
/// # Examples
///
/// ```
/// use crawjud_storage::{StorageOptions, MIN_CHUNK_SIZE};
///
/// let options = StorageOptions::default().with_chunk_size(1024);
/// assert_eq!(options.chunk_size(), MIN_CHUNK_SIZE);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// `filesystem`, `memory`, or an S3-compatible service (`minio`, `s3`, `gcs`).
    pub backend: String,
    /// Root directory of the filesystem backend.
    pub root: PathBuf,
    /// Directory for staging files; the system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
    pub chunk_size: usize,
    pub s3: S3Options,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            backend: "filesystem".to_string(),
            root: PathBuf::from("storage"),
            staging_dir: None,
            chunk_size: MAX_CHUNK_SIZE,
            s3: S3Options::default(),
        }
    }
}

impl StorageOptions {
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_s3(mut self, s3: S3Options) -> Self {
        self.s3 = s3;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Configured chunk size clamped to 64 KiB..=8 MiB.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Connection to an S3-compatible bucket.
///
/// Unset fields fall back to the `MINIO_URL_SERVER`, `MINIO_BUCKET_NAME`,
/// `MINIO_ACCESS_KEY` and `MINIO_SECRET_KEY` environment variables.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Options {
    /// Base URL, e.g. `http://minio:9000`.
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
        }
    }
}

impl std::fmt::Debug for S3Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Options")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl S3Options {
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.clone().or_else(|| env_value("MINIO_URL_SERVER"))
    }

    pub fn bucket(&self) -> Option<String> {
        self.bucket.clone().or_else(|| env_value("MINIO_BUCKET_NAME"))
    }

    pub fn access_key(&self) -> Option<String> {
        self.access_key.clone().or_else(|| env_value("MINIO_ACCESS_KEY"))
    }

    pub fn secret_key(&self) -> Option<String> {
        self.secret_key.clone().or_else(|| env_value("MINIO_SECRET_KEY"))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_clamped() {
        assert_eq!(StorageOptions::default().chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(StorageOptions::default().with_chunk_size(usize::MAX).chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(StorageOptions::default().with_chunk_size(100_000).chunk_size(), 100_000);
    }

    #[test]
    fn staging_defaults_to_temp_dir() {
        assert_eq!(StorageOptions::default().staging_dir(), std::env::temp_dir());
    }

    #[test]
    fn explicit_s3_settings_win_and_secret_is_masked() {
        let s3 = S3Options::default()
            .with_endpoint("http://minio:9000")
            .with_bucket("docs")
            .with_credentials("ak", "hunter2");
        assert_eq!(s3.endpoint().as_deref(), Some("http://minio:9000"));
        assert_eq!(s3.bucket().as_deref(), Some("docs"));
        assert_eq!(s3.secret_key().as_deref(), Some("hunter2"));
        assert!(!format!("{s3:?}").contains("hunter2"));
    }
}
