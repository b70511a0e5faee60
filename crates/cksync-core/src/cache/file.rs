// # File Cache Store
//
// File-based implementation of CacheStore with crash recovery.
//
// ## Purpose
//
// Persists the last-known hash/IP across daemon restarts so an unchanged
// egress IP does not trigger a redundant allowlist round-trip on every
// start.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validation on load
// - Automatic backup: keeps a `.backup` of the last known good state
// - Recovery: falls back to the backup if corruption is detected; if both
//   files are unreadable the store starts empty (the cache is rebuildable)
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "entries": {
//     "current_ip": { "value": "1.2.3.4", "updated_at": "2025-01-09T12:00:00Z" }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::cache_store::CacheStore;

/// Cache file format version
const CACHE_FILE_VERSION: &str = "1";

/// One cached value with its update timestamp
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheEntry {
    value: String,
    updated_at: DateTime<Utc>,
}

/// Serializable cache file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheFileFormat {
    version: String,
    entries: HashMap<String, CacheEntry>,
}

/// File-based cache store with atomic writes and backup recovery
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl FileCacheStore {
    /// Create or load a file cache store.
    ///
    /// Loads existing state if present, recovers from the backup on
    /// corruption, and starts empty when neither file is usable. Creates
    /// parent directories as needed.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::cache(format!(
                        "failed to create cache directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let entries = Self::load_with_recovery(&path).await;

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    /// Load entries, falling back to the backup and then to empty.
    /// Every cached value is rebuildable, so no load failure is fatal.
    async fn load_with_recovery(path: &Path) -> HashMap<String, CacheEntry> {
        match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("loaded cache file: {} entries", entries.len());
                entries
            }
            Err(e) => {
                tracing::warn!(
                    "cache file {} unreadable ({e}), trying backup",
                    path.display()
                );
                let backup = Self::backup_path(path);
                match Self::load(&backup).await {
                    Ok(entries) => {
                        tracing::info!("recovered cache from backup: {} entries", entries.len());
                        entries
                    }
                    Err(backup_err) => {
                        tracing::warn!(
                            "cache backup also unreadable ({backup_err}), starting empty"
                        );
                        HashMap::new()
                    }
                }
            }
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, CacheEntry>, Error> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::cache(format!("failed to read {}: {e}", path.display())))?;

        let file: CacheFileFormat = serde_json::from_str(&content)
            .map_err(|e| Error::cache(format!("failed to parse {}: {e}", path.display())))?;

        if file.version != CACHE_FILE_VERSION {
            tracing::warn!(
                "cache file version mismatch (expected {CACHE_FILE_VERSION}, got {}), loading anyway",
                file.version
            );
        }

        Ok(file.entries)
    }

    /// Write the current entries to disk atomically, keeping a backup of
    /// the previous file.
    async fn write(&self) -> Result<(), Error> {
        let snapshot = {
            let guard = self.entries.read().await;
            CacheFileFormat {
                version: CACHE_FILE_VERSION.to_string(),
                entries: guard.clone(),
            }
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| Error::cache(format!("failed to serialize cache: {e}")))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!("failed to create {}: {e}", temp_path.display()))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache(format!("failed to write {}: {e}", temp_path.display()))
            })?;
            file.flush().await.map_err(|e| {
                Error::cache(format!("failed to flush {}: {e}", temp_path.display()))
            })?;
        }

        if self.path.exists() {
            let backup = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup).await {
                tracing::warn!("failed to create cache backup: {e}");
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cache(format!(
                "failed to rename {} to {}: {e}",
                temp_path.display(),
                self.path.display()
            ))
        })?;

        tracing::trace!("cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        {
            let mut guard = self.entries.write().await;
            guard.insert(
                key.to_string(),
                CacheEntry {
                    value: value.to_string(),
                    updated_at: Utc::now(),
                },
            );
        }
        // Immediate write: two keys, rare updates
        self.write().await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        {
            let mut guard = self.entries.write().await;
            guard.remove(key);
        }
        self.write().await
    }

    async fn flush(&self) -> Result<(), Error> {
        self.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::cache_store::{CK_HASH_KEY, CURRENT_IP_KEY};
    use tempfile::tempdir;

    #[tokio::test]
    async fn roundtrip_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileCacheStore::new(&path).await.unwrap();
        assert_eq!(store.get(CURRENT_IP_KEY).await.unwrap(), None);

        store.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
        store.set(CK_HASH_KEY, "abc123").await.unwrap();
        assert!(path.exists());

        let store2 = FileCacheStore::new(&path).await.unwrap();
        assert_eq!(
            store2.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
            Some("10.0.0.1")
        );
        assert_eq!(
            store2.get(CK_HASH_KEY).await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn corrupted_file_recovers_from_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileCacheStore::new(&path).await.unwrap();
        store.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
        // Second write creates the backup of the first state
        store.set(CURRENT_IP_KEY, "10.0.0.2").await.unwrap();

        let backup = FileCacheStore::backup_path(&path);
        assert!(backup.exists(), "backup should exist after second write");

        fs::write(&path, b"not json at all").await.unwrap();

        let store2 = FileCacheStore::new(&path).await.unwrap();
        assert_eq!(
            store2.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
            Some("10.0.0.1"),
            "backup holds the state before the last write"
        );
    }

    #[tokio::test]
    async fn both_files_corrupt_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        fs::write(&path, b"garbage").await.unwrap();
        fs::write(FileCacheStore::backup_path(&path), b"also garbage")
            .await
            .unwrap();

        let store = FileCacheStore::new(&path).await.unwrap();
        assert_eq!(store.get(CURRENT_IP_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileCacheStore::new(&path).await.unwrap();
        store.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
        store.delete(CURRENT_IP_KEY).await.unwrap();

        let store2 = FileCacheStore::new(&path).await.unwrap();
        assert_eq!(store2.get(CURRENT_IP_KEY).await.unwrap(), None);
    }
}
