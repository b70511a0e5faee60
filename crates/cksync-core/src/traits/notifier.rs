// # Notifier Trait
//
// Defines the interface for pushing title+body messages to the operator.
//
// Delivery is best-effort end to end: implementations log failures and
// report `false`, and no caller treats an undelivered notification as a
// job failure.

use async_trait::async_trait;
use std::path::Path;

/// Trait for operator notification implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push a title+body message. Returns whether any delivery succeeded.
    async fn push(&self, title: &str, body: &str) -> bool;

    /// Push a message with an attached file. Returns whether any delivery
    /// succeeded.
    async fn push_document(&self, title: &str, body: &str, document: &Path) -> bool;
}

/// No-op notifier used when no notification channel is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn push(&self, title: &str, _body: &str) -> bool {
        tracing::debug!("notification channel disabled, dropping \"{title}\"");
        false
    }

    async fn push_document(&self, title: &str, _body: &str, _document: &Path) -> bool {
        tracing::debug!("notification channel disabled, dropping \"{title}\"");
        false
    }
}
