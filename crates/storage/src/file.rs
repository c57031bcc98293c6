//! File-backed storage backend
//!
//! Keeps a JSON object (`{"key": "value", ...}`) on disk. The file is the
//! source of truth: reads load it, and every mutation re-reads it under a
//! per-path lock, applies the one key it touches, and rewrites it with
//! temp-file + rename so a crash never leaves a half-written credential file.
//! Handles opened on the same path in one process share that lock, so a write
//! through one handle never drops a key written through another.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Result, StorageAdapter, StorageError, StorageFuture};

type PathLocks = std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// Write lock for `path`, shared by every handle opened on it.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<PathLocks> = OnceLock::new();
    LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

/// Canonical parent directory joined with the file name, so `./a.json` and
/// `/abs/a.json` share one lock even before the file exists.
async fn lock_key(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::Io("storage path has no file name".into()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|e| StorageError::Io(format!("resolving storage directory: {e}")))?;
    Ok(dir.join(file_name))
}

/// Durable key-value file. Any number of handles may point at the same path.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Open the store at `path`.
    ///
    /// A missing file is created as `{}` so later opens take the normal path.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let lock = path_lock(&lock_key(&path).await?);

        let entries = {
            let _guard = lock.lock().await;
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::Io(format!("checking storage file: {e}")))?;
            if exists {
                load(&path).await?
            } else {
                info!(path = %path.display(), "storage file not found, starting empty");
                let entries = HashMap::new();
                write_atomic(&path, &entries).await?;
                entries
            }
        };
        info!(path = %path.display(), keys = entries.len(), "opened storage file");

        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, let `apply` change it, and write it back if it did.
    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut entries = load(&self.path).await?;
        if apply(&mut entries) {
            write_atomic(&self.path, &entries).await?;
        }
        Ok(())
    }
}

impl StorageAdapter for FileStorage {
    fn id(&self) -> &str {
        "file"
    }

    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut entries = load(&self.path).await?;
            Ok(entries.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.update(|entries| {
                entries.insert(key.to_string(), value.to_string());
                true
            })
            .await?;
            debug!(key, "stored value");
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.update(|entries| {
                let removed = entries.remove(key).is_some();
                if removed {
                    debug!(key, "removed value");
                }
                removed
            })
            .await
        })
    }
}

/// Read the map at `path`. A file deleted out from under us reads as empty.
async fn load(path: &Path) -> Result<HashMap<String, String>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(StorageError::Io(format!("reading storage file: {e}"))),
    };
    serde_json::from_str(&contents)
        .map_err(|e| StorageError::Parse(format!("parsing storage file: {e}")))
}

/// Write the map to `path` atomically with 0600 permissions on unix.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| StorageError::Parse(format!("serializing storage file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| StorageError::Io("storage path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("storage");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StorageError::Io(format!("writing temp storage file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StorageError::Io(format!("setting storage file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StorageError::Io(format!("renaming temp storage file: {e}")))?;

    debug!(path = %path.display(), "persisted storage file");
    Ok(())
}
