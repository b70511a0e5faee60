// # Telegram Notifier
//
// Bot-API implementation of the cksync `Notifier` trait.
//
// Messages go through a (possibly proxied) bot HTTP API:
//
// ```http
// GET  {api_base}/bot{token}/sendMessage?chat_id=…&text=…&parse_mode=Markdown
// POST {api_base}/bot{token}/sendDocument   (multipart: chat_id, caption, document)
// ```
//
// Delivery is best-effort: recipients are tried in order and the first
// success wins; every failure is logged; nothing here ever propagates an
// error into the job that asked for the notification.

use async_trait::async_trait;
use cksync_core::traits::Notifier;
use cksync_core::{Error, NotifierConfig, Result};
use std::path::Path;
use std::time::Duration;

/// Default HTTP timeout for notification delivery
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot-API backed notifier
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_ids: Vec<i64>,
    client: reqwest::Client,
}

// The bot token is a credential; keep it out of Debug output
impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("token", &"<REDACTED>")
            .field("chat_ids", &self.chat_ids)
            .finish()
    }
}

impl TelegramNotifier {
    /// Create a notifier from configuration
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        if !config.is_enabled() {
            return Err(Error::config(
                "notifier configuration is incomplete (api_base, token and chat_ids required)",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            chat_ids: config.chat_ids.clone(),
            client,
        })
    }

    fn endpoint(&self, api_method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, api_method)
    }

    async fn send_message(&self, chat_id: i64, title: &str, body: &str) -> Result<()> {
        let chat_id = chat_id.to_string();
        let text = format!("*{title}*\n\n{body}");
        let response = self
            .client
            .get(self.endpoint("sendMessage"))
            .query(&[
                ("chat_id", chat_id.as_str()),
                ("text", text.as_str()),
                ("parse_mode", "Markdown"),
            ])
            .send()
            .await
            .map_err(|e| Error::notify(format!("sendMessage failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::notify(format!(
                "sendMessage returned HTTP {}",
                response.status()
            )))
        }
    }

    async fn send_document(
        &self,
        chat_id: i64,
        title: &str,
        body: &str,
        document: &Path,
    ) -> Result<()> {
        let bytes = tokio::fs::read(document)
            .await
            .map_err(|e| Error::notify(format!("cannot read {}: {e}", document.display())))?;
        let file_name = document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", format!("{title}\n\n{body}"))
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let response = self
            .client
            .post(self.endpoint("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::notify(format!("sendDocument failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::notify(format!(
                "sendDocument returned HTTP {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn push(&self, title: &str, body: &str) -> bool {
        for chat_id in &self.chat_ids {
            match self.send_message(*chat_id, title, body).await {
                Ok(()) => return true,
                Err(e) => tracing::error!("notification to {chat_id} failed: {e}"),
            }
        }
        false
    }

    async fn push_document(&self, title: &str, body: &str, document: &Path) -> bool {
        for chat_id in &self.chat_ids {
            match self.send_document(*chat_id, title, body, document).await {
                Ok(()) => return true,
                Err(e) => tracing::error!("document notification to {chat_id} failed: {e}"),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_base: &str) -> NotifierConfig {
        NotifierConfig {
            api_base: api_base.to_string(),
            token: "bot-secret".to_string(),
            chat_ids: vec![42],
        }
    }

    #[test]
    fn incomplete_config_is_rejected() {
        let mut incomplete = config("https://api.telegram.org");
        incomplete.chat_ids.clear();
        assert!(TelegramNotifier::new(&incomplete).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let notifier = TelegramNotifier::new(&config("https://api.telegram.org")).unwrap();
        let debug = format!("{notifier:?}");
        assert!(!debug.contains("bot-secret"));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let notifier = TelegramNotifier::new(&config("https://api.telegram.org/")).unwrap();
        assert_eq!(
            notifier.endpoint("sendMessage"),
            "https://api.telegram.org/botbot-secret/sendMessage"
        );
    }
}
