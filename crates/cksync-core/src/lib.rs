// # cksync-core
//
// Core library for the cksync credential/allowlist synchronizer.
//
// ## Architecture Overview
//
// This library provides everything except the HTTP integrations:
// - **Panel**: Trait for credential-management panels (list/add/delete)
// - **AllowlistService**: Trait for the proxy egress-IP allowlist
// - **CacheStore**: Trait for the small last-known-state cache
// - **Notifier**: Trait for best-effort operator notifications
// - **Reconciler**: Orchestrates the delete-then-add credential sync pass
// - **schedule**: Immortal interval and daily-at-clock-time loops
// - **jobs**: Bodies of the scheduled jobs (fetch, allowlist check, log cleanup)
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Orchestration is separate from integrations
// 2. **Policy in the Core**: Integrations are single-shot; the reconciler and
//    scheduler own isolation, ordering, and failure handling
// 3. **Library-First**: Every operation the daemon or a command surface
//    triggers is a plain public function or method here
// 4. **Rebuildable State**: The cache only holds change-detection hints and
//    can be rebuilt from the primary panel at any time

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod reconcile;
pub mod schedule;
pub mod traits;

// Re-export core types for convenience
pub use cache::{FileCacheStore, MemoryCacheStore};
pub use config::{
    AllowlistConfig, CacheConfig, HttpPolicy, JobsConfig, NotifierConfig, PanelEndpoint,
    SyncConfig,
};
pub use error::{Error, Result};
pub use extract::{ParsedCookie, PreservationSet, parse_cookie};
pub use reconcile::{PanelOutcome, PanelStatus, PassSummary, Reconciler};
pub use traits::{
    AllowlistService, CacheStore, Credential, EnvId, NullNotifier, Notifier, Panel,
    CK_HASH_KEY, CURRENT_IP_KEY,
};
