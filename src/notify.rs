//! Signal delivery
//!
//! Delivery is fire-and-forget: a notifier logs its own failures and never
//! reports them back to the scanner.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::error::{ConfigError, FetchError};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}

/// Telegram bot notifier
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: &TelegramConfig) -> Result<Self, ConfigError> {
        let (token, chat_id) = config.credentials()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            chat_id,
        })
    }

    async fn post_message(&self, text: &str) -> Result<(), FetchError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let params = [("chat_id", self.chat_id.as_str()), ("text", text)];

        let response = self.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        match self.post_message(text).await {
            Ok(()) => debug!("Telegram message delivered"),
            Err(e) => warn!("Failed to deliver Telegram message: {}", e),
        }
    }
}

/// Writes signals to the log only (dry runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) {
        info!("[dry-run] signal:\n{}", text);
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_requires_credentials() {
        let config = TelegramConfig {
            token: Some("123:abc".to_string()),
            chat_id: None,
            ..TelegramConfig::default()
        };
        let err = TelegramNotifier::new(Client::new(), &config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("TELEGRAM_CHAT_ID")));
    }

    #[test]
    fn test_telegram_trims_api_url() {
        let config = TelegramConfig {
            token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            api_url: "https://api.telegram.org/".to_string(),
        };
        let notifier = TelegramNotifier::new(Client::new(), &config).unwrap();
        assert_eq!(notifier.api_url, "https://api.telegram.org");
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.send("first").await;
        notifier.send("second").await;
        assert_eq!(notifier.messages(), vec!["first", "second"]);
    }
}
