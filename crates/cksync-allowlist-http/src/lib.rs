// # HTTP Allowlist Service
//
// This crate provides the HTTP implementation of the cksync
// `AllowlistService` trait: the proxy allowlist API and plain-text
// egress-IP detection.
//
// ## API Reference
//
// Allowlist API: one GET endpoint selected by a `service` parameter:
//
// ```http
// GET {api_url}?authkey=…&service=AddWhite&format=json&white=1.2.3.4
// GET {api_url}?authkey=…&service=DelWhite&format=json&white=1.2.3.4
// GET {api_url}?authkey=…&service=GetWhite&format=json
// ```
//
// responding with `{ "ret": 200, "msg": …, "data": [ … ] }`. Any `ret`
// other than 200 is a rejection carrying `msg`.
//
// IP echo: a GET returning the caller's public IP as plain text.
//
// ## Failure Policy
//
// Allowlist mutations are best-effort: every failure (transport, HTTP
// status, envelope rejection) is logged and reported as `false`/empty —
// the next scheduled check retries the whole comparison. Only IP detection
// raises, because without it the check cannot run at all.

use async_trait::async_trait;
use cksync_core::traits::AllowlistService;
use cksync_core::{AllowlistConfig, Error, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Default HTTP timeout for allowlist and echo requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts per request (transport failures only)
const ATTEMPTS: u32 = 2;

/// Fixed pause between attempts
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Allowlist API response envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    ret: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Vec<String>>,
}

/// HTTP-backed allowlist service
pub struct HttpAllowlist {
    api_url: String,
    auth_key: String,
    echo_url: String,
    client: reqwest::Client,
}

// The auth key grants allowlist control; keep it out of Debug output
impl std::fmt::Debug for HttpAllowlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAllowlist")
            .field("api_url", &self.api_url)
            .field("auth_key", &"<REDACTED>")
            .field("echo_url", &self.echo_url)
            .finish()
    }
}

impl HttpAllowlist {
    /// Create a service wrapper from configuration
    pub fn new(config: &AllowlistConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.clone(),
            auth_key: config.auth_key.clone(),
            echo_url: config.echo_url.clone(),
            client,
        })
    }

    /// GET with a bounded transport retry, returning the response on any
    /// HTTP status
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut attempt = 1;
        loop {
            match self.client.get(url).query(query).send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < ATTEMPTS => {
                    tracing::warn!(
                        "allowlist request failed (attempt {attempt}/{ATTEMPTS}), retrying: {e}"
                    );
                    tokio::time::sleep(RETRY_PAUSE).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One allowlist API call; `None` means the call failed (already logged)
    async fn service_call(&self, service: &str, ip: Option<&str>) -> Option<Envelope> {
        let mut query = vec![
            ("authkey", self.auth_key.as_str()),
            ("service", service),
            ("format", "json"),
        ];
        if let Some(ip) = ip {
            query.push(("white", ip));
        }

        let response = match self.get_with_retry(&self.api_url, &query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("allowlist {service} request failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!("allowlist {service} returned HTTP {}", response.status());
            return None;
        }

        match response.json::<Envelope>().await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::error!("allowlist {service} returned an unreadable body: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl AllowlistService for HttpAllowlist {
    async fn current_ip(&self) -> Result<String> {
        let response = self
            .get_with_retry(&self.echo_url, &[])
            .await
            .map_err(|e| Error::ip_detection(format!("echo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ip_detection(format!(
                "echo service returned HTTP {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::ip_detection(format!("failed to read echo response: {e}")))?;
        let text = text.trim();

        // Reject HTML error pages and the like
        let ip: IpAddr = text
            .parse()
            .map_err(|_| Error::ip_detection(format!("echo service returned non-IP: {text:?}")))?;

        Ok(ip.to_string())
    }

    async fn add(&self, ip: &str) -> bool {
        match self.service_call("AddWhite", Some(ip)).await {
            Some(envelope) if envelope.ret == 200 => {
                tracing::info!("added {ip} to the allowlist");
                true
            }
            Some(envelope) => {
                tracing::error!(
                    "allowlist add of {ip} rejected: {}",
                    envelope.msg.unwrap_or_else(|| "unknown error".to_string())
                );
                false
            }
            None => false,
        }
    }

    async fn remove(&self, ip: &str) -> bool {
        match self.service_call("DelWhite", Some(ip)).await {
            Some(envelope) if envelope.ret == 200 => {
                tracing::info!("removed {ip} from the allowlist");
                true
            }
            Some(envelope) => {
                tracing::error!(
                    "allowlist removal of {ip} rejected: {}",
                    envelope.msg.unwrap_or_else(|| "unknown error".to_string())
                );
                false
            }
            None => false,
        }
    }

    async fn list(&self) -> Vec<String> {
        match self.service_call("GetWhite", None).await {
            Some(envelope) if envelope.ret == 200 => envelope.data.unwrap_or_default(),
            Some(envelope) => {
                tracing::error!(
                    "allowlist listing rejected: {}",
                    envelope.msg.unwrap_or_else(|| "unknown error".to_string())
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}
