//! Credential reconciliation across panels
//!
//! The [`Reconciler`] makes every secondary panel's credential set match the
//! primary panel's enabled set, leaving preserved identity keys untouched on
//! secondaries regardless of whether they also exist on the primary.
//!
//! ## Pass structure
//!
//! ```text
//! ┌─────────┐  enabled set        ┌──────────────┐
//! │ primary │────────────────────▶│  Reconciler  │
//! └─────────┘  (with remarks)     └──────────────┘
//!                                        │
//!              phase 1 (concurrent, joined before phase 2)
//!         ┌──────────────────────────────┼──────────────────────┐
//!         ▼                              ▼                      ▼
//!   delete non-preserved          delete non-preserved         ...
//!   on secondary A                on secondary B
//!         └──────────────────────────────┼──────────────────────┘
//!              phase 2 (concurrent)      │
//!         ┌──────────────────────────────┼──────────────────────┐
//!         ▼                              ▼                      ▼
//!   add primary set               add primary set              ...
//! ```
//!
//! The phase barrier is load-bearing: the panel API's add is a pure append
//! with no overwrite-by-identity-key semantics, so stale non-preserved
//! entries must be gone from a panel before the fresh set is injected —
//! otherwise a panel could briefly hold two records for the same account
//! with different secrets, and the stale one would survive the pass.
//!
//! Each panel's failure is isolated into its own outcome record; one
//! panel's error never aborts the others. An empty (or unreachable)
//! primary aborts the whole pass before any deletion — a primary-side
//! outage must not cascade into wiping every secondary.
//!
//! Passes are idempotent and may overlap (manual trigger racing a scheduled
//! run); there is deliberately no pass-level lock. An overlapping pass
//! re-derives the same target state.

use crate::error::Result;
use crate::extract::PreservationSet;
use crate::traits::{Credential, EnvId, Notifier, Panel};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-panel result of one phase of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOutcome {
    /// Panel name
    pub panel: String,
    /// Whether the phase succeeded on this panel
    pub success: bool,
    /// Human-readable status, carrying the panel's own message on failure
    pub message: String,
    /// Number of records deleted on this panel (0 for add-phase outcomes)
    pub deleted: usize,
}

impl PanelOutcome {
    fn ok(panel: &str, message: impl Into<String>, deleted: usize) -> Self {
        Self {
            panel: panel.to_string(),
            success: true,
            message: message.into(),
            deleted,
        }
    }

    fn failed(panel: &str, message: impl Into<String>) -> Self {
        Self {
            panel: panel.to_string(),
            success: false,
            message: message.into(),
            deleted: 0,
        }
    }
}

/// Aggregated result of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    /// Whether the pass was aborted before touching any secondary
    pub aborted: bool,
    /// Number of enabled credentials fetched from the primary
    pub primary_count: usize,
    /// Total records deleted across all secondaries
    pub deleted_total: usize,
    /// Phase-1 outcome per secondary
    pub delete_outcomes: Vec<PanelOutcome>,
    /// Phase-2 outcome per secondary
    pub add_outcomes: Vec<PanelOutcome>,
}

impl PassSummary {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Self::default()
        }
    }

    /// Number of secondaries where both phases succeeded
    pub fn synced_panels(&self) -> usize {
        self.add_outcomes
            .iter()
            .filter(|add| {
                add.success
                    && self
                        .delete_outcomes
                        .iter()
                        .any(|del| del.panel == add.panel && del.success)
            })
            .count()
    }
}

/// Per-panel credential census, used by status surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelStatus {
    /// Panel name
    pub panel: String,
    /// Whether the panel answered the listing request
    pub reachable: bool,
    /// Total recognized credentials (enabled + disabled)
    pub total: usize,
    /// Enabled credentials
    pub enabled: usize,
    /// Disabled credentials
    pub disabled: usize,
    /// Credentials whose identity key is preserved
    pub preserved: usize,
}

/// Orchestrates credential reconciliation from one primary panel to N
/// secondaries.
///
/// All collaborators are injected at construction; the reconciler holds no
/// mutable state and its passes are idempotent, so one instance can serve
/// both the scheduled loop and a manual trigger.
pub struct Reconciler {
    primary: Arc<dyn Panel>,
    secondaries: Vec<Arc<dyn Panel>>,
    preserved: PreservationSet,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        primary: Arc<dyn Panel>,
        secondaries: Vec<Arc<dyn Panel>>,
        preserved: PreservationSet,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            primary,
            secondaries,
            preserved,
            notifier,
        }
    }

    /// Run one full reconciliation pass.
    ///
    /// This is both the scheduled job body and the manual trigger. A
    /// pass-level unexpected error is reported to the operator before being
    /// returned; per-panel failures are folded into the summary instead.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        match self.run_pass_inner().await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("reconciliation pass failed: {e}");
                self.notifier
                    .push("credential sync failed", &e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    async fn run_pass_inner(&self) -> Result<PassSummary> {
        info!("starting credential sync pass");

        // A failing primary is treated exactly like an empty one: abort
        // before any secondary is touched.
        let primary_set = match self.primary.list_credentials(false).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(
                    "primary panel '{}' unreachable, aborting pass: {e}",
                    self.primary.name()
                );
                return Ok(PassSummary::aborted());
            }
        };

        if primary_set.is_empty() {
            warn!(
                "primary panel '{}' returned no enabled credentials, aborting pass",
                self.primary.name()
            );
            return Ok(PassSummary::aborted());
        }

        info!(
            "fetched {} enabled credentials from primary '{}'",
            primary_set.len(),
            self.primary.name()
        );

        // Phase 1: delete non-preserved records on every secondary. The join
        // below is a hard barrier: phase 2 must not start until every delete
        // task has completed, successfully or not.
        let delete_outcomes = self
            .fan_out(|panel| {
                let preserved = self.preserved.clone();
                async move { clean_panel(panel.as_ref(), &preserved).await }
            })
            .await;

        let deleted_total: usize = delete_outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .map(|outcome| outcome.deleted)
            .sum();
        info!("cleaned {deleted_total} non-preserved credentials from secondaries");

        // Phase 2: inject the primary's set into every secondary, remarks
        // carried verbatim.
        let primary_set = Arc::new(primary_set);
        let add_outcomes = self
            .fan_out(|panel| {
                let credentials = Arc::clone(&primary_set);
                async move { add_to_panel(panel.as_ref(), &credentials).await }
            })
            .await;

        let summary = PassSummary {
            aborted: false,
            primary_count: primary_set.len(),
            deleted_total,
            delete_outcomes,
            add_outcomes,
        };

        info!(
            "credential sync pass complete: {} credentials to {}/{} panels, {} deleted",
            summary.primary_count,
            summary.synced_panels(),
            self.secondaries.len(),
            summary.deleted_total
        );
        for outcome in summary.delete_outcomes.iter().chain(&summary.add_outcomes) {
            if !outcome.success {
                warn!("panel '{}': {}", outcome.panel, outcome.message);
            }
        }

        Ok(summary)
    }

    /// Run phase 1 alone: delete non-preserved credentials on every
    /// secondary without re-adding anything. Manual cleanup surface.
    pub async fn clean_secondaries(&self) -> Vec<PanelOutcome> {
        self.fan_out(|panel| {
            let preserved = self.preserved.clone();
            async move { clean_panel(panel.as_ref(), &preserved).await }
        })
        .await
    }

    /// Collect a per-secondary credential census for status reporting.
    pub async fn collect_status(&self) -> Vec<PanelStatus> {
        let preserved = self.preserved.clone();
        let mut handles = Vec::with_capacity(self.secondaries.len());
        for panel in &self.secondaries {
            let panel = Arc::clone(panel);
            let preserved = preserved.clone();
            let name = panel.name().to_string();
            handles.push((
                name,
                tokio::spawn(async move { panel_status(panel.as_ref(), &preserved).await }),
            ));
        }

        let mut statuses = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            statuses.push(match handle.await {
                Ok(status) => status,
                Err(e) => {
                    error!("status task for panel '{name}' aborted: {e}");
                    PanelStatus {
                        panel: name,
                        reachable: false,
                        total: 0,
                        enabled: 0,
                        disabled: 0,
                        preserved: 0,
                    }
                }
            });
        }
        statuses
    }

    /// Spawn one task per secondary and join them all — the explicit phase
    /// barrier. A panicked task becomes a failure outcome for its panel;
    /// it never takes the pass or its siblings down.
    async fn fan_out<F, Fut>(&self, make_task: F) -> Vec<PanelOutcome>
    where
        F: Fn(Arc<dyn Panel>) -> Fut,
        Fut: std::future::Future<Output = PanelOutcome> + Send + 'static,
    {
        let mut handles = Vec::with_capacity(self.secondaries.len());
        for panel in &self.secondaries {
            let name = panel.name().to_string();
            handles.push((name, tokio::spawn(make_task(Arc::clone(panel)))));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            outcomes.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => PanelOutcome::failed(&name, format!("panel task aborted: {e}")),
            });
        }
        outcomes
    }
}

/// Delete every non-preserved credential on one panel.
async fn clean_panel(panel: &dyn Panel, preserved: &PreservationSet) -> PanelOutcome {
    let credentials = match panel.list_credentials(true).await {
        Ok(credentials) => credentials,
        Err(e) => return PanelOutcome::failed(panel.name(), format!("listing failed: {e}")),
    };

    if credentials.is_empty() {
        return PanelOutcome::ok(panel.name(), "no credentials found", 0);
    }

    let to_delete: Vec<EnvId> = credentials
        .iter()
        .filter(|credential| !preserved.contains(&credential.pin))
        .filter_map(|credential| credential.id.clone())
        .collect();

    if to_delete.is_empty() {
        return PanelOutcome::ok(panel.name(), "nothing to delete", 0);
    }

    match panel.delete_credentials(&to_delete).await {
        Ok((true, _)) => PanelOutcome::ok(
            panel.name(),
            format!("deleted {} non-preserved credentials", to_delete.len()),
            to_delete.len(),
        ),
        Ok((false, message)) => {
            PanelOutcome::failed(panel.name(), format!("delete rejected: {message}"))
        }
        Err(e) => PanelOutcome::failed(panel.name(), format!("delete failed: {e}")),
    }
}

/// Inject the primary's credential set into one panel.
async fn add_to_panel(panel: &dyn Panel, credentials: &[Credential]) -> PanelOutcome {
    match panel.add_credentials(credentials).await {
        Ok((true, message)) => PanelOutcome::ok(panel.name(), message, 0),
        Ok((false, message)) => {
            PanelOutcome::failed(panel.name(), format!("add rejected: {message}"))
        }
        Err(e) => PanelOutcome::failed(panel.name(), format!("add failed: {e}")),
    }
}

/// Census one panel's credentials.
async fn panel_status(panel: &dyn Panel, preserved: &PreservationSet) -> PanelStatus {
    match panel.list_credentials(true).await {
        Ok(credentials) => {
            let enabled = credentials.iter().filter(|c| c.enabled).count();
            let preserved_count = credentials
                .iter()
                .filter(|c| preserved.contains(&c.pin))
                .count();
            PanelStatus {
                panel: panel.name().to_string(),
                reachable: true,
                total: credentials.len(),
                enabled,
                disabled: credentials.len() - enabled,
                preserved: preserved_count,
            }
        }
        Err(e) => {
            warn!("panel '{}' census failed: {e}", panel.name());
            PanelStatus {
                panel: panel.name().to_string(),
                reachable: false,
                total: 0,
                enabled: 0,
                disabled: 0,
                preserved: 0,
            }
        }
    }
}
