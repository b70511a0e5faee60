// # Panel Trait
//
// Defines the interface for credential-management panels.
//
// ## Implementations
//
// - QingLong: `cksync-panel-qinglong` crate
//
// ## Responsibility Boundaries
//
// Panel implementations own transport concerns only: authentication, the
// wire shape of list/add/delete, per-call timeouts, and the bounded retry
// policy. They must NOT decide what to delete or preserve, cache anything
// beyond the access token, or talk to other panels — partitioning, phase
// ordering and failure isolation are owned by the [`Reconciler`].
//
// [`Reconciler`]: crate::reconcile::Reconciler

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque record identifier assigned by a panel.
///
/// Panels disagree on the shape: older releases expose a string `_id`,
/// newer ones a numeric `id`. Deletion bodies echo back whichever shape
/// the listing produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvId {
    /// Numeric id
    Num(i64),
    /// String id
    Str(String),
}

impl std::fmt::Display for EnvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvId::Num(n) => write!(f, "{n}"),
            EnvId::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One session-cookie credential as seen on a panel.
///
/// `pin` is the stable identity key correlating credentials across panels;
/// `value` is the canonical cookie string carrying the rotating secret.
/// Two credentials refer to the same logical account iff their pins match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Identity key (account pin), already stripped of its field prefix
    pub pin: String,

    /// Canonical cookie value (`pt_key=…;pt_pin=…;`)
    pub value: String,

    /// Free-text annotation, carried verbatim through reconciliation
    pub remarks: String,

    /// Whether the panel has this record enabled
    pub enabled: bool,

    /// Panel-assigned remote identifier; `None` on credentials about to be
    /// inserted
    pub id: Option<EnvId>,
}

/// Trait for credential-management panel implementations
///
/// All methods are single operations against one panel. Errors use the
/// crate taxonomy: `Auth` when no token can be obtained, `Network` for
/// transport failure after retries, `Application` for well-formed error
/// responses. Application-level rejection of bulk operations is reported
/// in-band as `(false, message)` so callers can fold it into per-panel
/// outcomes without losing the panel's own wording.
#[async_trait]
pub trait Panel: Send + Sync {
    /// Fetch credentials of the recognized type.
    ///
    /// When `include_disabled` is false only enabled records are returned.
    /// Records whose raw value is missing either credential field are
    /// silently skipped — they are not surfaced and not counted as errors.
    async fn list_credentials(&self, include_disabled: bool) -> crate::Result<Vec<Credential>>;

    /// Bulk-delete records by remote id.
    ///
    /// Empty input is a no-op success with no request sent. An
    /// application-level rejection returns `(false, panel message)`.
    async fn delete_credentials(&self, ids: &[EnvId]) -> crate::Result<(bool, String)>;

    /// Bulk-insert credentials, preserving each one's annotation verbatim.
    ///
    /// Empty input is a no-op success with no request sent.
    async fn add_credentials(&self, credentials: &[Credential]) -> crate::Result<(bool, String)>;

    /// Human-readable panel name (for logging and outcome reports)
    fn name(&self) -> &str;
}
