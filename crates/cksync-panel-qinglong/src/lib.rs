// # QingLong Panel Client
//
// This crate provides a QingLong panel implementation of the cksync `Panel`
// trait.
//
// ## API Reference
//
// - Token:  GET  `/open/auth/token?client_id=…&client_secret=…`
//           → `{ "code": 200, "data": { "token": "…" } }`
// - List:   GET  `/open/envs` (bearer)
//           → `{ "code": 200, "data": [ { "_id"|"id", "name", "value",
//              "remarks", "status" } ] }`
// - Add:    POST `/open/envs` (bearer), body `[ { "name", "value",
//           "remarks" } ]`
// - Delete: DELETE `/open/envs` (bearer), body `[ id, … ]`
//
// An envelope `code` other than 200 is an application-level failure carrying
// the panel's own message. `status` 0 means enabled, 1 disabled. Only
// `JD_COOKIE` records are credentials; anything else in `/open/envs` is
// some other environment variable and ignored.
//
// ## Responsibility Boundaries
//
// The client is transport only: token caching, the bounded retry policy,
// and typed parsing. What to delete or preserve is decided by the
// reconciler. The access token is cached for the lifetime of the instance;
// there is no expiry or refresh handling — a long-lived daemon constructs
// fresh clients per pass cheaply.
//
// ## Security
//
// The client secret and the cached token never appear in logs; the Debug
// implementation redacts both.

use async_trait::async_trait;
use cksync_core::config::{HttpPolicy, PanelEndpoint};
use cksync_core::extract::parse_cookie;
use cksync_core::traits::{Credential, EnvId, Panel};
use cksync_core::{Error, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

/// Environment variable name the panel stores credentials under
const ENV_NAME: &str = "JD_COOKIE";

/// `status` value marking an enabled record
const STATUS_ENABLED: i64 = 0;

/// QingLong panel client
pub struct QingLongPanel {
    base_url: String,
    client_id: String,
    client_secret: String,
    name: String,
    attempts: u32,
    retry_pause: Duration,
    client: reqwest::Client,
    /// Token cached for the instance lifetime; never refreshed
    token: Mutex<Option<String>>,
}

// Custom Debug implementation that hides the client secret and token
impl std::fmt::Debug for QingLongPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QingLongPanel")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .finish()
    }
}

/// One request against the panel API, dispatched by [`QingLongPanel::execute`]
struct RequestSpec<'a> {
    method: Method,
    path: &'a str,
    query: &'a [(&'a str, &'a str)],
    body: Option<Value>,
    /// Whether to obtain and attach a bearer token first
    authenticated: bool,
}

/// Generic response envelope
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn message(&self) -> String {
        self.message.clone().unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Payload of the token endpoint
#[derive(Debug, Deserialize)]
struct TokenData {
    token: String,
}

/// One raw environment-variable record from `/open/envs`
#[derive(Debug, Deserialize)]
struct EnvRecord {
    #[serde(alias = "_id")]
    id: Option<EnvId>,
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    remarks: Option<String>,
    #[serde(default = "default_status")]
    status: i64,
}

fn default_status() -> i64 {
    1
}

impl QingLongPanel {
    /// Create a client for one panel endpoint with the given HTTP policy
    pub fn new(endpoint: &PanelEndpoint, policy: HttpPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            client_id: endpoint.client_id.clone(),
            client_secret: endpoint.client_secret.clone(),
            name: endpoint.name.clone(),
            attempts: policy.attempts.max(1),
            retry_pause: Duration::from_secs(policy.retry_pause_secs),
            client,
            token: Mutex::new(None),
        })
    }

    /// Exchange client credentials for an access token, caching the result.
    ///
    /// Every failure on this path — rejection, unreachable panel, missing
    /// token in the response — is an authentication error: the caller holds
    /// no token and must not attempt the protected call.
    async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let value = self
            .execute(RequestSpec {
                method: Method::GET,
                path: "/open/auth/token",
                query: &[
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
                body: None,
                authenticated: false,
            })
            .await
            .map_err(|e| Error::auth(format!("{}: token exchange failed: {e}", self.name)))?;

        let envelope: Envelope<TokenData> = serde_json::from_value(value)
            .map_err(|e| Error::auth(format!("{}: malformed token response: {e}", self.name)))?;

        if envelope.code != 200 {
            return Err(Error::auth(format!(
                "{}: token rejected: {}",
                self.name,
                envelope.message()
            )));
        }

        let token = envelope
            .data
            .map(|data| data.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::auth(format!("{}: token response had no token", self.name)))?;

        *cached = Some(token.clone());
        tracing::debug!("obtained access token for panel '{}'", self.name);
        Ok(token)
    }

    /// Execute one request with the bounded retry policy.
    ///
    /// Retries cover transport failures and non-auth HTTP errors with a
    /// fixed pause between attempts. Authentication errors are final
    /// immediately — retrying a rejected credential cannot succeed.
    async fn execute(&self, spec: RequestSpec<'_>) -> Result<Value> {
        let token = if spec.authenticated {
            Some(Box::pin(self.token()).await?)
        } else {
            None
        };

        let url = format!("{}{}", self.base_url, spec.path);
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            let mut request = self.client.request(spec.method.clone(), &url);
            if !spec.query.is_empty() {
                request = request.query(spec.query);
            }
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &spec.body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            Error::shape(format!(
                                "{}: invalid JSON from {}: {e}",
                                self.name, spec.path
                            ))
                        });
                    }

                    let body = response.text().await.unwrap_or_default();
                    let error = match status.as_u16() {
                        401 | 403 => Error::auth(format!(
                            "{}: HTTP {status} from {}",
                            self.name, spec.path
                        )),
                        _ => Error::application(
                            &self.name,
                            format!("HTTP {status} from {}: {body}", spec.path),
                        ),
                    };
                    if matches!(error, Error::Auth(_)) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    last_error = Some(Error::network(format!("{}: {e}", self.name)));
                }
            }

            if attempt < self.attempts {
                tracing::warn!(
                    "panel '{}': {} {} failed (attempt {attempt}/{}), retrying",
                    self.name,
                    spec.method,
                    spec.path,
                    self.attempts
                );
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::network(format!("{}: request never attempted", self.name))))
    }

    /// Parse one raw env record into a credential; `None` means "not a
    /// usable credential" (wrong env name or malformed cookie value).
    fn credential_from_record(record: EnvRecord) -> Option<Credential> {
        if record.name != ENV_NAME {
            return None;
        }
        let parsed = parse_cookie(&record.value)?;
        Some(Credential {
            pin: parsed.pin_value(),
            value: parsed.canonical_value(),
            remarks: record.remarks.unwrap_or_default(),
            enabled: record.status == STATUS_ENABLED,
            id: record.id,
        })
    }
}

#[async_trait]
impl Panel for QingLongPanel {
    async fn list_credentials(&self, include_disabled: bool) -> Result<Vec<Credential>> {
        let value = self
            .execute(RequestSpec {
                method: Method::GET,
                path: "/open/envs",
                query: &[],
                body: None,
                authenticated: true,
            })
            .await?;

        let envelope: Envelope<Vec<Value>> = serde_json::from_value(value)
            .map_err(|e| Error::shape(format!("{}: malformed env listing: {e}", self.name)))?;

        if envelope.code != 200 {
            return Err(Error::application(&self.name, envelope.message()));
        }

        let mut credentials = Vec::new();
        for raw in envelope.data.unwrap_or_default() {
            // Validate-or-skip: one malformed record must not poison the
            // whole listing
            let record: EnvRecord = match serde_json::from_value(raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!("panel '{}': skipping malformed env record: {e}", self.name);
                    continue;
                }
            };
            if let Some(credential) = Self::credential_from_record(record) {
                if include_disabled || credential.enabled {
                    credentials.push(credential);
                }
            }
        }

        tracing::debug!(
            "panel '{}': listed {} credentials (include_disabled={include_disabled})",
            self.name,
            credentials.len()
        );
        Ok(credentials)
    }

    async fn delete_credentials(&self, ids: &[EnvId]) -> Result<(bool, String)> {
        if ids.is_empty() {
            return Ok((true, "no credentials to delete".to_string()));
        }

        let value = self
            .execute(RequestSpec {
                method: Method::DELETE,
                path: "/open/envs",
                query: &[],
                body: Some(serde_json::to_value(ids)?),
                authenticated: true,
            })
            .await?;

        let envelope: Envelope<Value> = serde_json::from_value(value)
            .map_err(|e| Error::shape(format!("{}: malformed delete response: {e}", self.name)))?;

        if envelope.code == 200 {
            Ok((true, format!("deleted {} credentials", ids.len())))
        } else {
            Ok((false, envelope.message()))
        }
    }

    async fn add_credentials(&self, credentials: &[Credential]) -> Result<(bool, String)> {
        if credentials.is_empty() {
            return Ok((true, "no credentials to add".to_string()));
        }

        let payload: Vec<Value> = credentials
            .iter()
            .map(|credential| {
                serde_json::json!({
                    "name": ENV_NAME,
                    "value": credential.value,
                    "remarks": credential.remarks,
                })
            })
            .collect();

        let value = self
            .execute(RequestSpec {
                method: Method::POST,
                path: "/open/envs",
                query: &[],
                body: Some(Value::Array(payload)),
                authenticated: true,
            })
            .await?;

        let envelope: Envelope<Value> = serde_json::from_value(value)
            .map_err(|e| Error::shape(format!("{}: malformed add response: {e}", self.name)))?;

        if envelope.code == 200 {
            Ok((true, format!("added {} credentials", credentials.len())))
        } else {
            Ok((false, envelope.message()))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
