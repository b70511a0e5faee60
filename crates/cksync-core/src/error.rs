//! Error types for the cksync system
//!
//! One taxonomy for the whole workspace: panel and allowlist integrations
//! construct these, the reconciler and jobs decide what each variant means
//! for a pass (per-panel failure, abort, skip).

use thiserror::Error;

/// Result type alias for cksync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cksync system
#[derive(Error, Debug)]
pub enum Error {
    /// Panel rejected the client credentials or could not issue a token.
    /// Fatal for that panel's current operation; never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure after exhausting retries
    #[error("network error: {0}")]
    Network(String),

    /// Service returned a well-formed error response
    #[error("{service} error: {message}")]
    Application {
        /// Service name (panel name, "allowlist", ...)
        service: String,
        /// Error message as provided by the service
        message: String,
    },

    /// Response arrived but did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// Egress-IP detection failed
    #[error("IP detection failed: {0}")]
    IpDetection(String),

    /// Cache store errors
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Notification delivery errors
    #[error("notification error: {0}")]
    Notify(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors (snapshot file, log directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an application-level error carrying the service's own message
    pub fn application(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Application {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected-shape error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Create an IP detection error
    pub fn ip_detection(msg: impl Into<String>) -> Self {
        Self::IpDetection(msg.into())
    }

    /// Create a cache store error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
