//! Test doubles for reconciliation and job behavior tests
//!
//! Scripted implementations of the core traits that record every call into
//! shared state, so tests can assert exactly which panels were touched, with
//! which arguments, and in which order.

use async_trait::async_trait;
use cksync_core::error::{Error, Result};
use cksync_core::traits::{AllowlistService, Credential, EnvId, Notifier, Panel};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a credential as it would come back from a panel listing
pub fn credential(pin: &str, key: &str, remarks: &str, enabled: bool, id: i64) -> Credential {
    Credential {
        pin: pin.to_string(),
        value: format!("pt_key={key};pt_pin={pin};"),
        remarks: remarks.to_string(),
        enabled,
        id: Some(EnvId::Num(id)),
    }
}

/// What a scripted panel should do when its delete is invoked
#[derive(Debug, Clone)]
pub enum DeleteBehavior {
    Succeed,
    Reject(&'static str),
    FailTransport,
    /// Sleep before succeeding, to exercise the phase barrier
    SlowSucceed(Duration),
}

/// A panel double that serves a fixed listing and records every mutation.
///
/// All recorded calls also land in a shared, timestamp-ordered event log so
/// cross-panel ordering can be asserted.
pub struct ScriptedPanel {
    name: String,
    listing: Result<Vec<Credential>>,
    delete_behavior: DeleteBehavior,
    pub deleted_ids: Arc<Mutex<Vec<Vec<EnvId>>>>,
    pub added: Arc<Mutex<Vec<Vec<Credential>>>>,
    event_log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPanel {
    pub fn new(name: &str, listing: Vec<Credential>, event_log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            listing: Ok(listing),
            delete_behavior: DeleteBehavior::Succeed,
            deleted_ids: Arc::new(Mutex::new(Vec::new())),
            added: Arc::new(Mutex::new(Vec::new())),
            event_log,
        }
    }

    pub fn unreachable(name: &str, event_log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            listing: Err(Error::network("connection refused")),
            delete_behavior: DeleteBehavior::Succeed,
            deleted_ids: Arc::new(Mutex::new(Vec::new())),
            added: Arc::new(Mutex::new(Vec::new())),
            event_log,
        }
    }

    pub fn with_delete_behavior(mut self, behavior: DeleteBehavior) -> Self {
        self.delete_behavior = behavior;
        self
    }

    fn log(&self, event: &str) {
        self.event_log
            .lock()
            .unwrap()
            .push(format!("{}:{event}", self.name));
    }

    /// Every id this panel was asked to delete, flattened
    pub fn all_deleted(&self) -> Vec<EnvId> {
        self.deleted_ids.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Every credential this panel was asked to add, flattened
    pub fn all_added(&self) -> Vec<Credential> {
        self.added.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Panel for ScriptedPanel {
    async fn list_credentials(&self, include_disabled: bool) -> Result<Vec<Credential>> {
        self.log("list");
        match &self.listing {
            Ok(credentials) => Ok(credentials
                .iter()
                .filter(|c| include_disabled || c.enabled)
                .cloned()
                .collect()),
            Err(_) => Err(Error::network("connection refused")),
        }
    }

    async fn delete_credentials(&self, ids: &[EnvId]) -> Result<(bool, String)> {
        if let DeleteBehavior::SlowSucceed(delay) = &self.delete_behavior {
            tokio::time::sleep(*delay).await;
        }
        self.log("delete");
        self.deleted_ids.lock().unwrap().push(ids.to_vec());
        match &self.delete_behavior {
            DeleteBehavior::Succeed | DeleteBehavior::SlowSucceed(_) => {
                Ok((true, format!("deleted {} credentials", ids.len())))
            }
            DeleteBehavior::Reject(msg) => Ok((false, (*msg).to_string())),
            DeleteBehavior::FailTransport => Err(Error::network("delete timed out")),
        }
    }

    async fn add_credentials(&self, credentials: &[Credential]) -> Result<(bool, String)> {
        self.log("add");
        self.added.lock().unwrap().push(credentials.to_vec());
        Ok((true, format!("added {} credentials", credentials.len())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Notifier double recording every pushed message
#[derive(Default)]
pub struct RecordingNotifier {
    pub pushed: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.pushed.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn push(&self, title: &str, body: &str) -> bool {
        self.pushed
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        true
    }

    async fn push_document(&self, title: &str, body: &str, _document: &Path) -> bool {
        self.push(title, body).await
    }
}

/// Allowlist double with scripted add/remove results
pub struct ScriptedAllowlist {
    pub current: Result<String>,
    pub add_ok: bool,
    pub remove_ok: bool,
    pub added: Arc<Mutex<Vec<String>>>,
    pub removed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAllowlist {
    pub fn new(current: &str) -> Self {
        Self {
            current: Ok(current.to_string()),
            add_ok: true,
            remove_ok: true,
            added: Arc::new(Mutex::new(Vec::new())),
            removed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn detection_failure() -> Self {
        Self {
            current: Err(Error::ip_detection("echo service unreachable")),
            add_ok: true,
            remove_ok: true,
            added: Arc::new(Mutex::new(Vec::new())),
            removed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl AllowlistService for ScriptedAllowlist {
    async fn current_ip(&self) -> Result<String> {
        match &self.current {
            Ok(ip) => Ok(ip.clone()),
            Err(_) => Err(Error::ip_detection("echo service unreachable")),
        }
    }

    async fn add(&self, ip: &str) -> bool {
        self.added.lock().unwrap().push(ip.to_string());
        self.add_ok
    }

    async fn remove(&self, ip: &str) -> bool {
        self.removed.lock().unwrap().push(ip.to_string());
        self.remove_ok
    }

    async fn list(&self) -> Vec<String> {
        self.added.lock().unwrap().clone()
    }
}
