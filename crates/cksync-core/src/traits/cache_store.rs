// # Cache Store Trait
//
// Defines the interface for the small last-known-state cache.
//
// ## Purpose
//
// The cache holds change-detection hints only:
// - The digest of the last credential set written to the snapshot file
// - The last egress IP applied to the allowlist
//
// It is NOT authoritative: everything in it can be rebuilt from the primary
// panel and the allowlist service. Last-write-wins semantics are sufficient
// because no two jobs touch the same key.
//
// ## Implementations
//
// - In-memory: `MemoryCacheStore`
// - File-based: `FileCacheStore` (atomic writes, backup recovery)

use async_trait::async_trait;

/// Cache key for the last egress IP applied to the allowlist
pub const CURRENT_IP_KEY: &str = "current_ip";

/// Cache key for the digest of the last credential set snapshot
pub const CK_HASH_KEY: &str = "current_ck_hash";

/// Trait for cache store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`, if any
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Remove the value stored under `key` (no-op when absent)
    async fn delete(&self, key: &str) -> crate::Result<()>;

    /// Persist any pending changes
    async fn flush(&self) -> crate::Result<()>;
}
