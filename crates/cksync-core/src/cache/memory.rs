// # Memory Cache Store
//
// In-memory implementation of CacheStore.
//
// ## Purpose
//
// Keeps the last-known hash/IP in process memory only. After a restart the
// first fetch and IP check simply treat everything as changed, which is
// harmless: the cache is a change-detection hint, not a source of truth.
//
// ## When to Use
//
// - Testing
// - Deployments where a redundant allowlist add per restart is acceptable

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::cache_store::CacheStore;

/// In-memory cache store implementation
///
/// Stores all entries in a HashMap behind a RwLock. Cloning shares the
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCacheStore {
    /// Create a new empty memory cache store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the cache
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::cache_store::{CK_HASH_KEY, CURRENT_IP_KEY};

    #[tokio::test]
    async fn set_get_delete_roundtrip() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty().await);

        store.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
        store.set(CK_HASH_KEY, "abc123").await.unwrap();
        assert_eq!(store.len().await, 2);

        assert_eq!(
            store.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
            Some("10.0.0.1")
        );

        store.delete(CURRENT_IP_KEY).await.unwrap();
        assert_eq!(store.get(CURRENT_IP_KEY).await.unwrap(), None);
        assert_eq!(
            store.get(CK_HASH_KEY).await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryCacheStore::new();
        store.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
        store.set(CURRENT_IP_KEY, "10.0.0.2").await.unwrap();
        assert_eq!(
            store.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
            Some("10.0.0.2")
        );
    }
}
