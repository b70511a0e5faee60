// # Allowlist Service Trait
//
// Defines the interface for the proxy egress-IP allowlist and current-IP
// detection.
//
// Allowlist mutations are best-effort: a failure is logged by the
// implementation and reported as `false`/empty rather than raised, because
// the next scheduled check retries the whole comparison anyway. Only IP
// detection itself surfaces a typed error — without a current IP the
// change-detection job cannot proceed at all.

use async_trait::async_trait;

/// Trait for proxy allowlist implementations
#[async_trait]
pub trait AllowlistService: Send + Sync {
    /// Detect the current public egress IP.
    ///
    /// Fails with [`Error::IpDetection`](crate::Error::IpDetection) when the
    /// echo service is unreachable or returns something that is not an IP.
    async fn current_ip(&self) -> crate::Result<String>;

    /// Add an IP to the allowlist. Failures are logged, not raised.
    async fn add(&self, ip: &str) -> bool;

    /// Remove an IP from the allowlist. Failures are logged, not raised.
    async fn remove(&self, ip: &str) -> bool;

    /// List the currently allowlisted IPs. Failures yield an empty list.
    async fn list(&self) -> Vec<String>;
}
