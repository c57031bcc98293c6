//! Key-value storage backends for session credentials
//!
//! Defines the `StorageAdapter` trait that decouples credential handling from
//! where the bytes live. Backends are interchangeable:
//! - `MemoryStorage` keeps values for the lifetime of the process
//! - `FileStorage` persists a JSON object to disk with atomic writes
//! - `LayeredStorage` reads from a primary backend, falls back to a secondary,
//!   and writes through to both
//!
//! Adapters report failures as `StorageError`. Callers that need best-effort
//! semantics (the credential store) decide whether to swallow them.

pub mod file;
pub mod layered;
pub mod memory;

pub use file::FileStorage;
pub use layered::LayeredStorage;
pub use memory::MemoryStorage;

use std::future::Future;
use std::pin::Pin;

/// Errors from storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("storage parse error: {0}")]
    Parse(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Boxed future returned by adapter methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Asynchronous string key-value store.
///
/// Uses `Pin<Box<dyn Future>>` return types so adapters can be shared as
/// `Arc<dyn StorageAdapter>`.
pub trait StorageAdapter: Send + Sync {
    /// Backend label for logging (e.g. "memory", "file")
    fn id(&self) -> &str;

    /// Read a value. A missing key is `Ok(None)`.
    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

    /// Insert or replace a value.
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()>;

    /// Delete a value. Removing a missing key succeeds.
    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()>;
}
