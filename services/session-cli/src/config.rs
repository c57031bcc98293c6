//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The login password comes only from SESSION_PASSWORD, never from the TOML.

use common::Secret;
use serde::Deserialize;
use session_auth::StorageKeys;
use session_client::PipelineConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub renewal: RenewalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
}

/// Auth server settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Credentials live only as long as the process.
    #[default]
    Memory,
    /// JSON file, survives restarts.
    File,
    /// JSON file at `path`, mirrored to a second file at `fallback_path`
    /// that serves reads when the first is missing a key or unreadable.
    Layered,
}

/// Where credentials are kept
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub fallback_path: Option<PathBuf>,
    #[serde(default)]
    pub keys: StorageKeys,
}

/// Renewal policy
#[derive(Debug, Default, Deserialize)]
pub struct RenewalConfig {
    /// Extra paths whose 401 never triggers renewal (login is always exempt).
    #[serde(default)]
    pub exempt_paths: Vec<String>,
}

/// Metrics export
#[derive(Debug, Default, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus text file rewritten after every command. Unset disables
    /// metrics entirely.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("SESSION_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(password) = std::env::var("SESSION_PASSWORD") {
            let password = Secret::new(password);
            if !password.is_blank() {
                config.password = Some(password);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        match self.storage.backend {
            StorageBackend::Memory => {}
            StorageBackend::File => {
                if self.storage.path.is_none() {
                    return Err(common::Error::Config(
                        "storage.path is required for the file backend".into(),
                    ));
                }
            }
            StorageBackend::Layered => match (&self.storage.path, &self.storage.fallback_path) {
                (Some(primary), Some(fallback)) if primary == fallback => {
                    return Err(common::Error::Config(
                        "storage.fallback_path must differ from storage.path".into(),
                    ));
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(common::Error::Config(
                        "storage.path and storage.fallback_path are required for the layered backend"
                            .into(),
                    ));
                }
            },
        }

        for path in &self.renewal.exempt_paths {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "renewal.exempt_paths entries must start with '/', got: {path}"
                )));
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        self.renewal
            .exempt_paths
            .iter()
            .fold(PipelineConfig::new(&self.api.base_url), |config, path| {
                config.exempt_from_renewal(path)
            })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-cli.toml")
    }
}
