//! Core traits for the cksync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Panel`]: Credential-management panel operations
//! - [`AllowlistService`]: Proxy egress-IP allowlist operations
//! - [`CacheStore`]: Small last-known-state cache
//! - [`Notifier`]: Best-effort operator notifications

pub mod allowlist;
pub mod cache_store;
pub mod notifier;
pub mod panel;

pub use allowlist::AllowlistService;
pub use cache_store::{CacheStore, CK_HASH_KEY, CURRENT_IP_KEY};
pub use notifier::{NullNotifier, Notifier};
pub use panel::{Credential, EnvId, Panel};
