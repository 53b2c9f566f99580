//! Pipeline configuration.
//!
//! Layers, lowest first: built-in defaults, `crawjud.toml` (or the file given
//! with `--config`), then `CRAWJUD_*` environment variables where `__`
//! separates the section from the key (`CRAWJUD_POOL__REGIONS=2`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crawjud_captcha::ChallengeOptions;
use crawjud_fetch::{BotDeps, PoolOptions};
use crawjud_session::{AuthOptions, WebDriverOptions};
use crawjud_storage::{ObjectStore, StorageOptions};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "crawjud.toml";
pub const ENV_PREFIX: &str = "CRAWJUD_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    Missing(PathBuf),

    #[error(transparent)]
    Extract(#[from] Box<figment::Error>),

    #[error("invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// SSO timings and the browser automation endpoints, one `[auth]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub timing: AuthOptions,
    #[serde(flatten)]
    pub webdriver: WebDriverOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Default timeout of authenticated API calls.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Metadata cache directory; `<folder>/cache` when unset.
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn dir_for(&self, folder: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| folder.join("cache"))
    }
}

/// Everything a batch run needs, built once and passed by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pool: PoolOptions,
    pub auth: AuthConfig,
    pub captcha: ChallengeOptions,
    pub http: HttpConfig,
    pub storage: StorageOptions,
    pub cache: CacheConfig,
}

impl PipelineConfig {
    /// Loads and validates the layered configuration.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.is_file() => return Err(ConfigError::Missing(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::from_figment(Self::figment(&file))
    }

    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.pool.regions == 0 {
            return invalid("pool.regions", "must be at least 1");
        }
        if self.pool.cases_per_region == 0 {
            return invalid("pool.cases_per_region", "must be at least 1");
        }
        if self.captcha.max_attempts == 0 {
            return invalid("captcha.max_attempts", "must be at least 1");
        }
        if self.captcha.backoff_min_secs > self.captcha.backoff_max_secs {
            return Err(ConfigError::Invalid {
                key: "captcha.backoff_min_secs",
                reason: format!(
                    "{} exceeds backoff_max_secs {}",
                    self.captcha.backoff_min_secs, self.captcha.backoff_max_secs
                ),
            });
        }
        if self.captcha.ocr_command.is_empty() {
            return invalid("captcha.ocr_command", "must name a program");
        }
        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs", "must be at least 1");
        }
        if self.storage.chunk_size == 0 {
            return invalid("storage.chunk_size", "must be positive");
        }
        Ok(())
    }

    pub fn bot_deps(&self, store: Arc<dyn ObjectStore>) -> BotDeps {
        BotDeps {
            auth: self.auth.timing.clone(),
            webdriver: self.auth.webdriver.clone(),
            challenge: self.captcha.clone(),
            http_timeout: self.http.timeout(),
            storage: self.storage.clone(),
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pool.regions, 8);
        assert_eq!(config.captcha.max_attempts, 15);
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn file_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [pool]
                regions = 2

                [auth]
                validation_timeout_secs = 90
                webdriver_url = "http://grid:4444"

                [storage]
                backend = "memory"

                [storage.s3]
                endpoint = "http://minio:9000"
                "#,
            )?;
            jail.set_env("CRAWJUD_POOL__CASES_PER_REGION", "3");
            jail.set_env("CRAWJUD_CAPTCHA__MAX_ATTEMPTS", "5");
            jail.set_env("CRAWJUD_STORAGE__S3__BUCKET", "processos");

            let config = PipelineConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.pool, PoolOptions::default().with_regions(2).with_cases_per_region(3));
            assert_eq!(config.auth.timing.validation_timeout_secs, 90);
            assert_eq!(config.auth.timing.sso_delay_ms, 5000);
            assert_eq!(config.auth.webdriver.webdriver_url, "http://grid:4444");
            assert_eq!(config.captcha.max_attempts, 5);
            assert_eq!(config.storage.backend, "memory");
            assert_eq!(config.storage.s3.endpoint.as_deref(), Some("http://minio:9000"));
            assert_eq!(config.storage.s3.bucket.as_deref(), Some("processos"));
            assert_eq!(config.storage.s3.region, "us-east-1");
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected_after_merging() {
        Jail::expect_with(|jail| {
            jail.set_env("CRAWJUD_CAPTCHA__BACKOFF_MIN_SECS", "9");
            let err = PipelineConfig::load(None).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    key: "captcha.backoff_min_secs",
                    ..
                }
            ));

            jail.set_env("CRAWJUD_CAPTCHA__BACKOFF_MIN_SECS", "3");
            jail.set_env("CRAWJUD_POOL__REGIONS", "0");
            let err = PipelineConfig::load(None).unwrap_err();
            assert!(err.to_string().contains("pool.regions"));
            Ok(())
        });
    }

    #[test]
    fn explicit_config_must_exist() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/crawjud.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn cache_dir_defaults_under_folder() {
        let cache = CacheConfig::default();
        assert_eq!(cache.dir_for(Path::new("runs/a")), Path::new("runs/a/cache"));
    }
}
