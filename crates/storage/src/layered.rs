//! Primary + fallback storage pair
//!
//! Reads prefer the primary backend and fall back to the secondary when the
//! primary has nothing (or fails). Writes go to both so either one can serve
//! the next read; a write only fails when neither backend accepted it.

use std::sync::Arc;

use tracing::warn;

use crate::{StorageAdapter, StorageFuture};

pub struct LayeredStorage {
    primary: Arc<dyn StorageAdapter>,
    fallback: Arc<dyn StorageAdapter>,
}

impl LayeredStorage {
    pub fn new(primary: Arc<dyn StorageAdapter>, fallback: Arc<dyn StorageAdapter>) -> Self {
        Self { primary, fallback }
    }
}

impl StorageAdapter for LayeredStorage {
    fn id(&self) -> &str {
        "layered"
    }

    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            match self.primary.get(key).await {
                Ok(Some(value)) if !value.is_empty() => return Ok(Some(value)),
                Ok(_) => {}
                Err(e) => {
                    warn!(backend = self.primary.id(), key, error = %e, "primary read failed, trying fallback");
                }
            }
            self.fallback.get(key).await
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let primary = self.primary.set(key, value).await;
            let fallback = self.fallback.set(key, value).await;
            merge_writes(self, key, primary, fallback)
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let primary = self.primary.remove(key).await;
            let fallback = self.fallback.remove(key).await;
            merge_writes(self, key, primary, fallback)
        })
    }
}

/// Collapse two write results: Ok if either backend succeeded.
fn merge_writes(
    layered: &LayeredStorage,
    key: &str,
    primary: crate::Result<()>,
    fallback: crate::Result<()>,
) -> crate::Result<()> {
    match (primary, fallback) {
        (Err(e), Ok(())) => {
            warn!(backend = layered.primary.id(), key, error = %e, "primary write failed");
            Ok(())
        }
        (Ok(()), Err(e)) => {
            warn!(backend = layered.fallback.id(), key, error = %e, "fallback write failed");
            Ok(())
        }
        (Err(e), Err(_)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}
