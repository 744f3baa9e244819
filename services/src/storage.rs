//! Artifact storage capability: load and save opaque blobs by key.
//!
//! The core never assumes a storage medium. Offline jobs take a scope lock
//! before writing so that two runs targeting the same artifacts cannot
//! interleave their writes.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors produced by artifact storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No artifact stored under `key`.
    #[error("artifact not found: {key}")]
    NotFound { key: String },

    /// Key is empty or escapes the storage root.
    #[error("invalid artifact key: '{key}'")]
    InvalidKey { key: String },

    /// Another writer holds the scope lock.
    #[error("artifact scope is locked by another writer: {scope}")]
    Locked { scope: String },

    /// Underlying I/O failure.
    #[error("io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Load/save-by-key capability injected into training, ingestion, and serving.
pub trait ArtifactStorage: Send + Sync {
    /// Read the full blob stored under `key`.
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace the blob under `key`. Readers see either the old or the new blob.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// `true` if a blob is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Take exclusive write ownership of `scope` until the guard is dropped.
    fn lock(&self, scope: &str) -> Result<StorageLock, StorageError>;
}

/// RAII guard for an exclusive writer scope.
pub struct StorageLock {
    scope: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StorageLock {
    fn new(scope: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            scope: scope.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Scope this guard protects.
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!(target: "services::storage", scope = %self.scope, "scope lock released");
        }
    }
}

impl std::fmt::Debug for StorageLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageLock")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Keys are `/`-separated segments of `[A-Za-z0-9._-]`, never `.` or `..`.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|seg| {
            !seg.is_empty()
                && seg != "."
                && seg != ".."
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey { key: key.into() })
    }
}

// ── Filesystem ──────────────────────────────────────────────────────────────

/// Stores each artifact as a file under `root`.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never observes a partially written artifact.
#[derive(Debug, Clone)]
pub struct FsArtifactStorage {
    root: PathBuf,
}

impl FsArtifactStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            key: key.into(),
            source,
        }
    }
}

impl ArtifactStorage for FsArtifactStorage {
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(target: "services::storage", key, bytes = bytes.len(), "artifact loaded");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { key: key.into() })
            }
            Err(e) => Err(Self::io(key)(e)),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Self::io(key))?;
        }

        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        if let Err(e) = write_synced(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path)) {
            match fs::remove_file(&tmp) {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => warn!(
                    target: "services::storage",
                    path = %tmp.display(),
                    error = %cleanup,
                    "failed to remove temp file"
                ),
                _ => {}
            }
            return Err(Self::io(key)(e));
        }

        info!(
            target: "services::storage",
            key,
            bytes = bytes.len(),
            path = %path.display(),
            "artifact saved"
        );
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn lock(&self, scope: &str) -> Result<StorageLock, StorageError> {
        let lock_path = self.path_for(&format!("{scope}.lock"))?;
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(Self::io(scope))?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(
                    target: "services::storage",
                    scope,
                    path = %lock_path.display(),
                    "scope already locked"
                );
                return Err(StorageError::Locked {
                    scope: scope.into(),
                });
            }
            Err(e) => return Err(Self::io(scope)(e)),
        };
        // Owner pid helps when clearing a stale lock by hand.
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            warn!(
                target: "services::storage",
                path = %lock_path.display(),
                error = %e,
                "failed to record lock owner"
            );
        }

        debug!(target: "services::storage", scope, "scope lock acquired");
        Ok(StorageLock::new(scope, move || {
            if let Err(e) = fs::remove_file(&lock_path) {
                warn!(
                    target: "services::storage",
                    path = %lock_path.display(),
                    error = %e,
                    "failed to remove lock file"
                );
            }
        }))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// Process-local storage, used by tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryArtifactStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStorage for InMemoryArtifactStorage {
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let blobs = self.blobs.read().unwrap_or_else(|p| p.into_inner());
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { key: key.into() })
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().unwrap_or_else(|p| p.into_inner());
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        let blobs = self.blobs.read().unwrap_or_else(|p| p.into_inner());
        Ok(blobs.contains_key(key))
    }

    fn lock(&self, scope: &str) -> Result<StorageLock, StorageError> {
        validate_key(scope)?;
        let mut held = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if !held.insert(scope.to_string()) {
            return Err(StorageError::Locked {
                scope: scope.into(),
            });
        }
        let locks = Arc::clone(&self.locks);
        let owned = scope.to_string();
        Ok(StorageLock::new(scope, move || {
            let mut held = locks.lock().unwrap_or_else(|p| p.into_inner());
            held.remove(&owned);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_save_then_load_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path());

        storage.save("guardrail/ensemble.bin", b"abc\x00\xff").unwrap();
        assert!(storage.exists("guardrail/ensemble.bin").unwrap());
        assert_eq!(
            storage.load("guardrail/ensemble.bin").unwrap(),
            b"abc\x00\xff".to_vec()
        );

        // Overwrite replaces atomically and leaves no temp files behind.
        storage.save("guardrail/ensemble.bin", b"v2").unwrap();
        assert_eq!(storage.load("guardrail/ensemble.bin").unwrap(), b"v2".to_vec());
        let names: Vec<_> = fs::read_dir(dir.path().join("guardrail"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["ensemble.bin".to_string()]);
    }

    #[test]
    fn fs_failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path());

        // `index` becomes a non-empty directory, so renaming a file onto it fails.
        storage.save("index/passages.bin", b"v1").unwrap();
        assert!(matches!(
            storage.save("index", b"v2"),
            Err(StorageError::Io { .. })
        ));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["index".to_string()]);
        assert_eq!(storage.load("index/passages.bin").unwrap(), b"v1".to_vec());
    }

    #[test]
    fn fs_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path());
        assert!(matches!(
            storage.load("index/passages.bin"),
            Err(StorageError::NotFound { .. })
        ));
        assert!(!storage.exists("index/passages.bin").unwrap());
    }

    #[test]
    fn keys_cannot_escape_root() {
        let storage = InMemoryArtifactStorage::new();
        for bad in ["", "../x", "a//b", "a/./b", "a b", "/abs"] {
            assert!(
                matches!(storage.save(bad, b"x"), Err(StorageError::InvalidKey { .. })),
                "key {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn fs_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsArtifactStorage::new(dir.path());

        let guard = storage.lock("guardrail").unwrap();
        assert_eq!(guard.scope(), "guardrail");
        assert!(matches!(
            storage.lock("guardrail"),
            Err(StorageError::Locked { .. })
        ));
        // A different scope is independent.
        let _other = storage.lock("index").unwrap();

        drop(guard);
        assert!(storage.lock("guardrail").is_ok());
    }

    #[test]
    fn memory_lock_is_exclusive_until_dropped() {
        let storage = InMemoryArtifactStorage::new();
        let guard = storage.lock("index").unwrap();
        assert!(matches!(storage.lock("index"), Err(StorageError::Locked { .. })));
        drop(guard);
        assert!(storage.lock("index").is_ok());
    }

    #[test]
    fn memory_round_trip() {
        let storage = InMemoryArtifactStorage::new();
        assert!(storage.is_empty());
        storage.save("index/passages.bin", &[1, 2, 3]).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.load("index/passages.bin").unwrap(), vec![1, 2, 3]);
    }
}
