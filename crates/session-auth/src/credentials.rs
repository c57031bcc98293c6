//! Credential storage for session tokens
//!
//! Wraps an injected `StorageAdapter` and maps the three session values
//! (access token, refresh token, subject identifier) onto configurable keys.
//! Create one store per authenticated session; nothing here is global.
//!
//! Storage is best-effort: adapter errors are logged and treated as absence,
//! so callers never see a storage failure. An empty stored string also reads
//! as absent.

use std::sync::Arc;

use serde::Deserialize;
use storage::StorageAdapter;
use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY};
use crate::token::CredentialPair;

/// Storage keys for the session values. Missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub access: String,
    pub refresh: String,
    pub user_id: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access: ACCESS_TOKEN_KEY.to_string(),
            refresh: REFRESH_TOKEN_KEY.to_string(),
            user_id: USER_ID_KEY.to_string(),
        }
    }
}

/// Access/refresh token and subject identifier persistence.
pub struct CredentialStore {
    adapter: Arc<dyn StorageAdapter>,
    keys: StorageKeys,
}

impl CredentialStore {
    pub fn new(adapter: Arc<dyn StorageAdapter>, keys: StorageKeys) -> Self {
        Self { adapter, keys }
    }

    /// Store using the default key names.
    pub fn with_default_keys(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self::new(adapter, StorageKeys::default())
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(&self.keys.access).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(&self.keys.refresh).await
    }

    pub async fn save_access_token(&self, token: &str) {
        self.write(&self.keys.access, token).await;
    }

    pub async fn save_refresh_token(&self, token: &str) {
        self.write(&self.keys.refresh, token).await;
    }

    /// Persist both halves of a renewed credential pair.
    pub async fn save_pair(&self, pair: &CredentialPair) {
        self.save_access_token(&pair.access_token).await;
        self.save_refresh_token(&pair.refresh_token).await;
    }

    /// Remove both tokens. The subject identifier is kept.
    pub async fn delete_tokens(&self) {
        self.delete(&self.keys.access).await;
        self.delete(&self.keys.refresh).await;
    }

    pub async fn user_id(&self) -> Option<String> {
        self.read(&self.keys.user_id).await
    }

    pub async fn save_user_id(&self, user_id: &str) {
        self.write(&self.keys.user_id, user_id).await;
    }

    pub async fn delete_user_id(&self) {
        self.delete(&self.keys.user_id).await;
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.adapter.get(key).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(backend = self.adapter.id(), key, error = %e, "storage read failed, treating as absent");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        match self.adapter.set(key, value).await {
            Ok(()) => debug!(backend = self.adapter.id(), key, "stored credential value"),
            Err(e) => {
                warn!(backend = self.adapter.id(), key, error = %e, "storage write failed, value not persisted")
            }
        }
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.adapter.remove(key).await {
            warn!(backend = self.adapter.id(), key, error = %e, "storage remove failed");
        }
    }
}
