// # cksyncd - credential/allowlist sync daemon
//
// The daemon is a THIN integration layer:
// 1. Load and validate the configuration file
// 2. Initialize logging and the runtime
// 3. Wire panels, allowlist, cache and notifier into the core components
// 4. Spawn the recurring job loops and wait for a shutdown signal
//
// All synchronization logic lives in cksync-core; nothing here decides
// what to delete, preserve, or allowlist.
//
// ## Configuration
//
// One JSON file, resolved from (in order): the first CLI argument, the
// `CKSYNC_CONFIG` environment variable, `./cksync.json`.
//
// ```json
// {
//   "primary": { "name": "main", "base_url": "http://ql.local:5700",
//                "client_id": "…", "client_secret": "…" },
//   "secondaries": [ { "name": "spare", "base_url": "…",
//                      "client_id": "…", "client_secret": "…" } ],
//   "preserved_pins": [ "pt_pin=keeper;" ],
//   "allowlist": { "api_url": "…", "auth_key": "…" },
//   "notifier": { "api_base": "…", "token": "…", "chat_ids": [ 123 ] },
//   "cache": { "type": "file", "path": "data/cache.json" }
// }
// ```
//
// `CKSYNC_LOG_LEVEL` (trace|debug|info|warn|error) controls verbosity.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use cksync_core::config::CacheConfig;
use cksync_core::extract::PreservationSet;
use cksync_core::reconcile::Reconciler;
use cksync_core::schedule::{self, FirstRun};
use cksync_core::traits::{AllowlistService, CacheStore, Notifier, NullNotifier, Panel};
use cksync_core::{FileCacheStore, MemoryCacheStore, SyncConfig, jobs};

use cksync_allowlist_http::HttpAllowlist;
use cksync_notify_telegram::TelegramNotifier;
use cksync_panel_qinglong::QingLongPanel;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Resolve the configuration file path from CLI args and environment
fn config_path() -> PathBuf {
    env::args()
        .nth(1)
        .or_else(|| env::var("CKSYNC_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cksync.json"))
}

/// Load and validate the configuration
fn load_config(path: &PathBuf) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration file {}", path.display()))?;
    let config: SyncConfig = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse configuration file {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> ExitCode {
    let path = config_path();
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match env::var("CKSYNC_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return DaemonExitCode::ConfigError.into();
    }

    info!("starting cksyncd (config: {})", path.display());
    info!(
        "primary '{}', {} secondary panel(s), {} preserved pin(s)",
        config.primary.name,
        config.secondaries.len(),
        config.preserved_pins.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {e}");
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("daemon error: {e:#}");
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: SyncConfig) -> Result<()> {
    // Cache store
    let cache: Arc<dyn CacheStore> = match &config.cache {
        CacheConfig::Memory => Arc::new(MemoryCacheStore::new()),
        CacheConfig::File { path } => Arc::new(FileCacheStore::new(path).await?),
    };

    // Panels
    let primary: Arc<dyn Panel> = Arc::new(QingLongPanel::new(&config.primary, config.http)?);
    let mut secondaries: Vec<Arc<dyn Panel>> = Vec::with_capacity(config.secondaries.len());
    for endpoint in &config.secondaries {
        secondaries.push(Arc::new(QingLongPanel::new(endpoint, config.http)?));
    }

    // Allowlist and notifier
    let allowlist: Arc<dyn AllowlistService> = Arc::new(HttpAllowlist::new(&config.allowlist)?);
    let notifier: Arc<dyn Notifier> = if config.notifier.is_enabled() {
        Arc::new(TelegramNotifier::new(&config.notifier)?)
    } else {
        info!("no notification channel configured, notifications disabled");
        Arc::new(NullNotifier)
    };

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&primary),
        secondaries,
        PreservationSet::new(&config.preserved_pins),
        Arc::clone(&notifier),
    ));

    let offset = FixedOffset::east_opt(config.jobs.daily_utc_offset_hours * 3600)
        .context("invalid daily_utc_offset_hours")?;

    notifier
        .push("cksyncd started", "Credential and allowlist sync is running.")
        .await;

    // Recurring loops. Each is an independent, immortal task; job failures
    // are logged inside the loop and never tear anything down.
    let fetch_loop = {
        let primary = Arc::clone(&primary);
        let cache = Arc::clone(&cache);
        let snapshot = PathBuf::from(&config.snapshot_path);
        tokio::spawn(schedule::run_every(
            "credential fetch",
            Duration::from_secs(config.jobs.fetch_interval_mins * 60),
            FirstRun::Immediate,
            move || {
                let primary = Arc::clone(&primary);
                let cache = Arc::clone(&cache);
                let snapshot = snapshot.clone();
                async move {
                    jobs::fetch_credentials(primary.as_ref(), cache.as_ref(), &snapshot)
                        .await
                        .map(|_| ())
                }
            },
        ))
    };

    let ip_loop = {
        let allowlist = Arc::clone(&allowlist);
        let cache = Arc::clone(&cache);
        let notifier = Arc::clone(&notifier);
        tokio::spawn(schedule::run_every(
            "allowlist check",
            Duration::from_secs(config.jobs.ip_check_interval_mins * 60),
            FirstRun::Immediate,
            move || {
                let allowlist = Arc::clone(&allowlist);
                let cache = Arc::clone(&cache);
                let notifier = Arc::clone(&notifier);
                async move {
                    jobs::check_ip(allowlist.as_ref(), cache.as_ref(), notifier.as_ref())
                        .await
                        .map(|_| ())
                }
            },
        ))
    };

    // The first sync is deferred one interval so a daemon restart does not
    // immediately hammer every panel.
    let sync_loop = {
        let reconciler = Arc::clone(&reconciler);
        tokio::spawn(schedule::run_every(
            "credential sync",
            Duration::from_secs(config.jobs.sync_interval_mins * 60),
            FirstRun::Deferred,
            move || {
                let reconciler = Arc::clone(&reconciler);
                async move { reconciler.run_pass().await.map(|_| ()) }
            },
        ))
    };

    let log_clean_loop = {
        let notifier = Arc::clone(&notifier);
        let log_dir = PathBuf::from(&config.log_dir);
        tokio::spawn(schedule::run_daily_at(
            "log cleanup",
            config.jobs.log_clean_hour,
            config.jobs.log_clean_minute,
            offset,
            move || {
                let notifier = Arc::clone(&notifier);
                let log_dir = log_dir.clone();
                async move { jobs::clean_logs(&log_dir, notifier.as_ref()).await }
            },
        ))
    };

    info!("all job loops running");

    let signal_name = wait_for_shutdown().await?;
    info!("received {signal_name}, shutting down");

    fetch_loop.abort();
    ip_loop.abort();
    sync_loop.abort();
    log_clean_loop.abort();

    // Persist the cache before exiting
    cache.flush().await?;
    info!("cache flushed, daemon stopped");

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown (CTRL-C only) on non-Unix platforms
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
