//! Session CLI
//!
//! Command-line front end for the session client:
//! 1. Loads TOML config (base URL, storage backend, renewal exemptions)
//! 2. Installs the Prometheus recorder when a metrics textfile is configured
//! 3. Opens the configured credential storage
//! 4. Restores the persisted session subject
//! 5. Runs one command and prints the response envelope as JSON
//! 6. Writes the recorded counters to the metrics textfile

mod commands;
mod config;
mod metrics;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_auth::CredentialStore;
use session_client::{ApiClient, Session};
use storage::{FileStorage, LayeredStorage, MemoryStorage, StorageAdapter};

use crate::commands::{Command, split_args};
use crate::config::{Config, StorageBackend, StorageConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so stdout carries only command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cli_config_path, words) = split_args(&args)?;
    let command = Command::parse(&words)?;

    let config_path = Config::resolve_path(cli_config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        backend = ?config.storage.backend,
        exempt_paths = config.renewal.exempt_paths.len(),
        "configuration loaded"
    );

    let prometheus = match &config.metrics.textfile {
        Some(_) => Some(metrics::install_recorder()?),
        None => None,
    };

    let session = build_session(&config).await?;
    let outcome = command.run(&session, config.password.as_ref()).await;

    if let (Some(handle), Some(path)) = (&prometheus, &config.metrics.textfile) {
        match metrics::write_textfile(handle, path) {
            Ok(()) => info!(path = %path.display(), "metrics written"),
            Err(e) => {
                let error = format!("{e:#}");
                warn!(path = %path.display(), %error, "failed to write metrics");
            }
        }
    }

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn build_session(config: &Config) -> Result<Session> {
    let adapter = open_storage(&config.storage).await?;
    let store = CredentialStore::new(adapter, config.storage.keys.clone());
    let http = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let client = ApiClient::new(config.pipeline(), http, Arc::new(store));

    Ok(Session::restore(Arc::new(client)).await)
}

async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>> {
    let adapter: Arc<dyn StorageAdapter> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::File => {
            let path = config
                .path
                .as_deref()
                .context("storage.path is required for the file backend")?;
            Arc::new(open_file(path).await?)
        }
        StorageBackend::Layered => {
            let (Some(path), Some(fallback_path)) = (&config.path, &config.fallback_path) else {
                anyhow::bail!(
                    "storage.path and storage.fallback_path are required for the layered backend"
                );
            };
            Arc::new(LayeredStorage::new(
                Arc::new(open_file(path).await?),
                Arc::new(open_file(fallback_path).await?),
            ))
        }
    };
    info!(backend = adapter.id(), "credential storage ready");
    Ok(adapter)
}

async fn open_file(path: &Path) -> Result<FileStorage> {
    FileStorage::open(path.to_path_buf())
        .await
        .with_context(|| format!("failed to open credential file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_auth::StorageKeys;
    use std::path::PathBuf;

    fn layered(path: PathBuf, fallback_path: PathBuf) -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::Layered,
            path: Some(path),
            fallback_path: Some(fallback_path),
            keys: StorageKeys::default(),
        }
    }

    #[tokio::test]
    async fn layered_backend_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.json");
        let fallback = dir.path().join("fallback.json");

        let adapter = open_storage(&layered(primary.clone(), fallback.clone()))
            .await
            .unwrap();
        assert_eq!(adapter.id(), "layered");
        adapter.set("user-id", "u-1").await.unwrap();

        for path in [&primary, &fallback] {
            let reopened = FileStorage::open(path.clone()).await.unwrap();
            assert_eq!(reopened.get("user-id").await.unwrap().as_deref(), Some("u-1"));
        }
    }

    #[tokio::test]
    async fn layered_backend_reads_fallback_when_primary_lost_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.json");
        let fallback = dir.path().join("fallback.json");

        let adapter = open_storage(&layered(primary.clone(), fallback))
            .await
            .unwrap();
        adapter.set("refresh-token", "rt_1").await.unwrap();
        std::fs::write(&primary, "{}").unwrap();

        assert_eq!(
            adapter.get("refresh-token").await.unwrap().as_deref(),
            Some("rt_1")
        );
    }

    #[tokio::test]
    async fn file_backend_without_path_is_an_error() {
        let config = StorageConfig {
            backend: StorageBackend::File,
            ..StorageConfig::default()
        };
        let err = open_storage(&config).await.err().unwrap();
        assert!(err.to_string().contains("storage.path"), "got: {err}");
    }
}
