//! Bodies of the scheduled jobs
//!
//! Each function here is one job invocation, written against the traits so
//! the scheduler, the daemon, and any command surface can all drive the
//! same logic. Error handling follows the propagation policy: jobs return
//! `Err` only for failures worth a log line at the loop level; best-effort
//! sub-steps (allowlist mutations, notifications) are absorbed here.

use crate::error::Result;
use crate::traits::{AllowlistService, CacheStore, Notifier, Panel, CK_HASH_KEY, CURRENT_IP_KEY};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// Result of one egress-IP check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpCheckOutcome {
    /// Current IP matches the cached one; nothing done
    Unchanged,
    /// New IP allowlisted and cached; stale removal is best-effort
    Updated {
        /// Previously cached IP, if any
        previous: Option<String>,
        /// Newly applied IP
        current: String,
    },
    /// New IP could not be allowlisted; cache left pointing at the old IP
    AddFailed {
        /// The IP that could not be added
        current: String,
    },
}

/// Fetch the primary panel's enabled credentials, write them to the
/// snapshot file and cache the set digest. Returns the credential count.
///
/// An empty primary yields a warning and leaves both the snapshot and the
/// cached digest untouched.
pub async fn fetch_credentials(
    primary: &dyn Panel,
    cache: &dyn CacheStore,
    snapshot_path: &Path,
) -> Result<usize> {
    info!("fetching credentials from primary '{}'", primary.name());
    let credentials = primary.list_credentials(false).await?;

    if credentials.is_empty() {
        warn!("primary '{}' returned no enabled credentials", primary.name());
        return Ok(0);
    }

    if let Some(parent) = snapshot_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let values: Vec<&str> = credentials.iter().map(|c| c.value.as_str()).collect();
    fs::write(snapshot_path, values.join("\n")).await?;

    let digest = credential_set_digest(values.iter().copied());
    cache.set(CK_HASH_KEY, &digest).await?;

    info!(
        "saved {} credentials to {}",
        credentials.len(),
        snapshot_path.display()
    );
    Ok(credentials.len())
}

/// Deterministic digest of a credential set, independent of listing order.
///
/// Only used to answer "did the set change since last fetch", so a 64-bit
/// FNV-1a over the sorted values is enough.
pub fn credential_set_digest<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut sorted: Vec<&str> = values.into_iter().collect();
    sorted.sort_unstable();

    let mut hash = FNV_OFFSET;
    for value in sorted {
        for byte in value.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        // field separator so ["ab","c"] and ["a","bc"] differ
        hash ^= u64::from(b'\n');
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

/// Compare the current egress IP with the cached one and update the
/// allowlist on change.
///
/// Ordering is deliberate: the new IP is added first, and only if that
/// succeeded is the old IP removed and the cache updated. A failed removal
/// of the stale IP is logged and otherwise ignored — an over-permissive
/// allowlist is recoverable, losing our own access is not.
pub async fn check_ip(
    allowlist: &dyn AllowlistService,
    cache: &dyn CacheStore,
    notifier: &dyn Notifier,
) -> Result<IpCheckOutcome> {
    let current = allowlist.current_ip().await?;
    let cached = cache.get(CURRENT_IP_KEY).await?;

    if cached.as_deref() == Some(current.as_str()) {
        info!("egress IP unchanged ({current})");
        return Ok(IpCheckOutcome::Unchanged);
    }

    info!(
        "egress IP changed: {} -> {current}",
        cached.as_deref().unwrap_or("<none>")
    );

    if !allowlist.add(&current).await {
        warn!("could not allowlist new IP {current}, keeping previous entry");
        return Ok(IpCheckOutcome::AddFailed { current });
    }

    if let Some(previous) = &cached {
        if !allowlist.remove(previous).await {
            warn!("stale IP {previous} could not be removed from the allowlist");
        }
    }

    cache.set(CURRENT_IP_KEY, &current).await?;

    notifier
        .push(
            "egress allowlist updated",
            &format!(
                "Egress IP change detected and applied.\nOld IP: {}\nNew IP: {current}",
                cached.as_deref().unwrap_or("<none>")
            ),
        )
        .await;

    Ok(IpCheckOutcome::Updated {
        previous: cached,
        current,
    })
}

/// Wipe and recreate the log directory, notifying the operator either way.
pub async fn clean_logs(log_dir: &Path, notifier: &dyn Notifier) -> Result<()> {
    if fs::metadata(log_dir).await.is_err() {
        warn!("log directory {} does not exist", log_dir.display());
        return Ok(());
    }

    match wipe_dir(log_dir).await {
        Ok(()) => {
            info!("cleaned log directory {}", log_dir.display());
            notifier
                .push(
                    "log cleanup complete",
                    &format!("Emptied directory: {}", log_dir.display()),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            notifier.push("log cleanup failed", &e.to_string()).await;
            Err(e)
        }
    }
}

async fn wipe_dir(dir: &Path) -> Result<()> {
    fs::remove_dir_all(dir).await?;
    fs::create_dir_all(dir).await?;
    Ok(())
}
