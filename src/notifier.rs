//! Alert delivery transports.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::NotifierConfig;
use crate::error::{MonitorError, Result};

/// Narrow capability the monitor uses to deliver transition alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, destination: &str, text: &str) -> Result<()>;
}

pub fn from_config(config: &NotifierConfig, timeout: Duration) -> Result<Arc<dyn Notifier>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MonitorError::Notifier(format!("failed to build HTTP client: {}", e)))?;

    Ok(match config {
        NotifierConfig::Telegram { bot_token } => {
            Arc::new(TelegramNotifier::new(bot_token.clone(), client))
        }
        NotifierConfig::Webhook { url } => Arc::new(WebhookNotifier::new(url.clone(), client)),
    })
}

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram bot transport; the destination is a chat id.
pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: TELEGRAM_API.to_string(),
            client,
        }
    }

    /// Sends through another Bot API server, e.g. a self-hosted one.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": destination,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Notifier(format!("Telegram request failed: {}", e.without_url())))?;

        if response.status().is_success() {
            debug!("Telegram alert sent to {}", destination);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(MonitorError::Notifier(format!(
                "Telegram API returned {}: {}",
                status, body
            )))
        }
    }
}

/// Discord-style webhook transport.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self { url: url.into(), client }
    }
}

pub fn webhook_payload(destination: &str, text: &str) -> serde_json::Value {
    let color = if text.starts_with('✅') { 0x2ECC71 } else { 0xE74C3C };
    serde_json::json!({
        "username": "NetPulse Engine",
        "content": text,
        "embeds": [{
            "title": "Reachability Transition",
            "description": text,
            "color": color,
            "fields": [
                { "name": "Destination", "value": destination, "inline": true }
            ],
            "timestamp": Utc::now().to_rfc3339(),
            "footer": { "text": "NetPulse Infrastructure Intelligence" }
        }]
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&webhook_payload(destination, text))
            .send()
            .await
            .map_err(|e| MonitorError::Notifier(format!("webhook request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Notifier(format!(
                "webhook returned {}",
                response.status()
            )))
        }
    }
}
