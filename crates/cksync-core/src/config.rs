//! Configuration types for the cksync system
//!
//! The whole runtime configuration is one [`SyncConfig`] value, deserialized
//! from a JSON file by the daemon and passed into components at construction.
//! Everything here is immutable after startup.

use serde::{Deserialize, Serialize};

/// Main cksync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// The primary panel (source of truth for the credential set)
    pub primary: PanelEndpoint,

    /// Secondary panels (targets of reconciliation)
    #[serde(default)]
    pub secondaries: Vec<PanelEndpoint>,

    /// Identity keys exempt from deletion on secondaries
    #[serde(default)]
    pub preserved_pins: Vec<String>,

    /// Proxy allowlist service and IP echo endpoint
    pub allowlist: AllowlistConfig,

    /// Operator notification channel (empty token disables notifications)
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Cache store backend for last-known hash/IP
    #[serde(default)]
    pub cache: CacheConfig,

    /// Scheduled job intervals and clock times
    #[serde(default)]
    pub jobs: JobsConfig,

    /// HTTP retry/timeout policy for panel operations
    #[serde(default)]
    pub http: HttpPolicy,

    /// File the credential fetch job writes the enabled set to
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Directory the daily cleanup job wipes and recreates
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.primary.validate("primary")?;
        for panel in &self.secondaries {
            panel.validate("secondary")?;
        }
        self.allowlist.validate()?;
        self.jobs.validate()?;

        if self.snapshot_path.is_empty() {
            return Err(crate::Error::config("snapshot_path cannot be empty"));
        }

        Ok(())
    }
}

/// One remote panel endpoint with its client credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelEndpoint {
    /// Human-readable name used in logs and outcome reports
    pub name: String,

    /// Base address, e.g. "http://panel.example:5700" (no trailing slash needed)
    pub base_url: String,

    /// OAuth-style client id
    pub client_id: String,

    /// OAuth-style client secret
    pub client_secret: String,
}

impl PanelEndpoint {
    fn validate(&self, role: &str) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config(format!("{role} panel name cannot be empty")));
        }
        if self.base_url.is_empty() {
            return Err(crate::Error::config(format!(
                "{role} panel '{}' has no base_url",
                self.name
            )));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "{role} panel '{}' base_url must be http(s): {}",
                self.name, self.base_url
            )));
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(crate::Error::config(format!(
                "{role} panel '{}' is missing client credentials",
                self.name
            )));
        }
        Ok(())
    }
}

/// Proxy allowlist service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistConfig {
    /// Allowlist API endpoint
    pub api_url: String,

    /// Auth key passed on every allowlist call
    pub auth_key: String,

    /// Plain-text IP echo service
    #[serde(default = "default_echo_url")]
    pub echo_url: String,
}

impl AllowlistConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.api_url.is_empty() {
            return Err(crate::Error::config("allowlist api_url cannot be empty"));
        }
        if self.auth_key.is_empty() {
            return Err(crate::Error::config("allowlist auth_key cannot be empty"));
        }
        if self.echo_url.is_empty() {
            return Err(crate::Error::config("allowlist echo_url cannot be empty"));
        }
        Ok(())
    }
}

/// Operator notification channel configuration
///
/// An empty `token` or an empty `chat_ids` list disables notifications;
/// the daemon then wires in a no-op notifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot API base, e.g. "https://api.telegram.org"
    #[serde(default)]
    pub api_base: String,

    /// Bot token
    #[serde(default)]
    pub token: String,

    /// Operator chat ids, tried in order until one delivery succeeds
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

impl NotifierConfig {
    /// Whether enough is configured to actually deliver notifications
    pub fn is_enabled(&self) -> bool {
        !self.api_base.is_empty() && !self.token.is_empty() && !self.chat_ids.is_empty()
    }
}

/// Cache store backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// File-backed cache (survives restarts)
    File {
        /// Path to the cache file
        path: String,
    },

    /// In-memory cache (every restart starts from a clean slate)
    #[default]
    Memory,
}

/// Scheduled job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Minutes between credential fetch runs (first run immediate)
    #[serde(default = "default_fetch_interval_mins")]
    pub fetch_interval_mins: u64,

    /// Minutes between egress-IP checks (first run immediate)
    #[serde(default = "default_ip_check_interval_mins")]
    pub ip_check_interval_mins: u64,

    /// Minutes between reconciliation passes (first run deferred one interval)
    #[serde(default = "default_sync_interval_mins")]
    pub sync_interval_mins: u64,

    /// Hour of day for the log cleanup job
    #[serde(default = "default_log_clean_hour")]
    pub log_clean_hour: u32,

    /// Minute for the log cleanup job
    #[serde(default = "default_log_clean_minute")]
    pub log_clean_minute: u32,

    /// Fixed UTC offset in hours for daily clock-time jobs
    #[serde(default = "default_daily_utc_offset_hours")]
    pub daily_utc_offset_hours: i32,
}

impl JobsConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_interval_mins == 0
            || self.ip_check_interval_mins == 0
            || self.sync_interval_mins == 0
        {
            return Err(crate::Error::config("job intervals must be > 0 minutes"));
        }
        if self.log_clean_hour > 23 || self.log_clean_minute > 59 {
            return Err(crate::Error::config(format!(
                "invalid log cleanup time {:02}:{:02}",
                self.log_clean_hour, self.log_clean_minute
            )));
        }
        if !(-12..=14).contains(&self.daily_utc_offset_hours) {
            return Err(crate::Error::config(format!(
                "daily_utc_offset_hours out of range: {}",
                self.daily_utc_offset_hours
            )));
        }
        Ok(())
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            fetch_interval_mins: default_fetch_interval_mins(),
            ip_check_interval_mins: default_ip_check_interval_mins(),
            sync_interval_mins: default_sync_interval_mins(),
            log_clean_hour: default_log_clean_hour(),
            log_clean_minute: default_log_clean_minute(),
            daily_utc_offset_hours: default_daily_utc_offset_hours(),
        }
    }
}

/// Retry/timeout policy for panel HTTP operations
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HttpPolicy {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per operation (1 = no retry)
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Fixed pause between attempts in seconds
    #[serde(default = "default_retry_pause_secs")]
    pub retry_pause_secs: u64,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
            retry_pause_secs: default_retry_pause_secs(),
        }
    }
}

fn default_snapshot_path() -> String {
    "data/ck.txt".to_string()
}

fn default_log_dir() -> String {
    "logs/scripts".to_string()
}

fn default_echo_url() -> String {
    "https://4.ipw.cn/".to_string()
}

fn default_fetch_interval_mins() -> u64 {
    20
}

fn default_ip_check_interval_mins() -> u64 {
    5
}

fn default_sync_interval_mins() -> u64 {
    30
}

fn default_log_clean_hour() -> u32 {
    23
}

fn default_log_clean_minute() -> u32 {
    59
}

fn default_daily_utc_offset_hours() -> i32 {
    8
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_attempts() -> u32 {
    2
}

fn default_retry_pause_secs() -> u64 {
    1
}
