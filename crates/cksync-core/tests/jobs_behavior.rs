//! Behavior tests for the scheduled job bodies

mod common;

use common::*;
use cksync_core::cache::MemoryCacheStore;
use cksync_core::jobs::{self, IpCheckOutcome};
use cksync_core::traits::{CacheStore, CK_HASH_KEY, CURRENT_IP_KEY};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn ip_change_updates_allowlist_and_cache() {
    let allowlist = ScriptedAllowlist::new("10.0.0.2");
    let cache = MemoryCacheStore::new();
    cache.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
    let notifier = RecordingNotifier::new();

    let outcome = jobs::check_ip(&allowlist, &cache, &notifier).await.unwrap();

    assert_eq!(
        outcome,
        IpCheckOutcome::Updated {
            previous: Some("10.0.0.1".to_string()),
            current: "10.0.0.2".to_string(),
        }
    );
    assert_eq!(*allowlist.added.lock().unwrap(), ["10.0.0.2"]);
    assert_eq!(*allowlist.removed.lock().unwrap(), ["10.0.0.1"]);
    assert_eq!(
        cache.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
        Some("10.0.0.2")
    );
    assert_eq!(notifier.titles(), ["egress allowlist updated"]);
}

#[tokio::test]
async fn failed_stale_removal_does_not_block_cache_update() {
    let mut allowlist = ScriptedAllowlist::new("10.0.0.2");
    allowlist.remove_ok = false;
    let cache = MemoryCacheStore::new();
    cache.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
    let notifier = RecordingNotifier::new();

    let outcome = jobs::check_ip(&allowlist, &cache, &notifier).await.unwrap();

    // Fail open: the add stands and the cache moves forward
    assert!(matches!(outcome, IpCheckOutcome::Updated { .. }));
    assert_eq!(
        cache.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
        Some("10.0.0.2")
    );
}

#[tokio::test]
async fn failed_add_keeps_old_ip_cached() {
    let mut allowlist = ScriptedAllowlist::new("10.0.0.2");
    allowlist.add_ok = false;
    let cache = MemoryCacheStore::new();
    cache.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
    let notifier = RecordingNotifier::new();

    let outcome = jobs::check_ip(&allowlist, &cache, &notifier).await.unwrap();

    assert_eq!(
        outcome,
        IpCheckOutcome::AddFailed {
            current: "10.0.0.2".to_string()
        }
    );
    assert!(allowlist.removed.lock().unwrap().is_empty());
    assert_eq!(
        cache.get(CURRENT_IP_KEY).await.unwrap().as_deref(),
        Some("10.0.0.1")
    );
    assert!(notifier.titles().is_empty());
}

#[tokio::test]
async fn unchanged_ip_is_a_no_op() {
    let allowlist = ScriptedAllowlist::new("10.0.0.1");
    let cache = MemoryCacheStore::new();
    cache.set(CURRENT_IP_KEY, "10.0.0.1").await.unwrap();
    let notifier = RecordingNotifier::new();

    let outcome = jobs::check_ip(&allowlist, &cache, &notifier).await.unwrap();

    assert_eq!(outcome, IpCheckOutcome::Unchanged);
    assert!(allowlist.added.lock().unwrap().is_empty());
    assert!(allowlist.removed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn first_ever_ip_has_nothing_to_remove() {
    let allowlist = ScriptedAllowlist::new("10.0.0.9");
    let cache = MemoryCacheStore::new();
    let notifier = RecordingNotifier::new();

    let outcome = jobs::check_ip(&allowlist, &cache, &notifier).await.unwrap();

    assert_eq!(
        outcome,
        IpCheckOutcome::Updated {
            previous: None,
            current: "10.0.0.9".to_string(),
        }
    );
    assert!(allowlist.removed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn detection_failure_propagates() {
    let allowlist = ScriptedAllowlist::detection_failure();
    let cache = MemoryCacheStore::new();
    let notifier = RecordingNotifier::new();

    let result = jobs::check_ip(&allowlist, &cache, &notifier).await;

    assert!(matches!(
        result,
        Err(cksync_core::Error::IpDetection(_))
    ));
    assert!(allowlist.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fetch_writes_snapshot_and_caches_digest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let primary = ScriptedPanel::new(
        "main",
        vec![
            credential("a_pin", "k1", "x", true, 1),
            credential("b_pin", "k2", "y", true, 2),
            credential("off_pin", "k3", "", false, 3),
        ],
        log,
    );
    let cache = MemoryCacheStore::new();
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("env").join("ck.txt");

    let count = jobs::fetch_credentials(&primary, &cache, &snapshot)
        .await
        .unwrap();

    // Disabled credentials are not part of the snapshot
    assert_eq!(count, 2);
    let content = tokio::fs::read_to_string(&snapshot).await.unwrap();
    assert_eq!(
        content,
        "pt_key=k1;pt_pin=a_pin;\npt_key=k2;pt_pin=b_pin;"
    );

    let digest = cache.get(CK_HASH_KEY).await.unwrap().unwrap();
    assert_eq!(
        digest,
        jobs::credential_set_digest([
            "pt_key=k1;pt_pin=a_pin;",
            "pt_key=k2;pt_pin=b_pin;",
        ])
    );
}

#[tokio::test]
async fn fetch_with_empty_primary_leaves_everything_alone() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let primary = ScriptedPanel::new("main", vec![], log);
    let cache = MemoryCacheStore::new();
    cache.set(CK_HASH_KEY, "previous").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("ck.txt");

    let count = jobs::fetch_credentials(&primary, &cache, &snapshot)
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert!(!snapshot.exists());
    assert_eq!(
        cache.get(CK_HASH_KEY).await.unwrap().as_deref(),
        Some("previous")
    );
}

#[tokio::test]
async fn clean_logs_recreates_directory_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    tokio::fs::create_dir_all(logs.join("nested")).await.unwrap();
    tokio::fs::write(logs.join("nested").join("old.log"), b"x")
        .await
        .unwrap();
    let notifier = RecordingNotifier::new();

    jobs::clean_logs(&logs, &notifier).await.unwrap();

    assert!(logs.exists());
    assert!(!logs.join("nested").exists());
    assert_eq!(notifier.titles(), ["log cleanup complete"]);
}

#[tokio::test]
async fn clean_logs_missing_directory_is_a_warning_only() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = RecordingNotifier::new();

    jobs::clean_logs(&dir.path().join("nope"), &notifier)
        .await
        .unwrap();

    assert!(notifier.titles().is_empty());
}
