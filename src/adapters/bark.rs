//! Bark push notifications.
//!
//! Sends run notifications to a Bark server (`POST {server}/push`) so the
//! operator sees terminated and failed runs on their phone.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{NotifyLevel, Notifier};

/// Configuration for the Bark client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarkConfig {
    #[serde(default = "default_server")]
    pub server: String,

    /// Device key; read from `CURATOR_BARK_KEY` when not set in the file
    #[serde(default)]
    pub device_key: String,

    /// Notification group shown on the device
    #[serde(default = "default_group")]
    pub group: String,

    /// HTTP timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BarkConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            device_key: String::new(),
            group: default_group(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BarkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_server() -> String {
    "https://api.day.app".to_string()
}

fn default_group() -> String {
    "curator".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    device_key: &'a str,
    title: &'a str,
    body: &'a str,
    group: &'a str,
    level: &'static str,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

/// Bark API client
pub struct BarkNotifier {
    config: BarkConfig,
    client: reqwest::Client,
}

impl BarkNotifier {
    pub fn new(config: BarkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build Bark HTTP client")?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!("{}/push", self.config.server.trim_end_matches('/'))
    }

    /// Bark interruption level for a notification severity
    fn interruption_level(level: NotifyLevel) -> &'static str {
        match level {
            NotifyLevel::Info => "passive",
            NotifyLevel::Success => "active",
            NotifyLevel::Warning | NotifyLevel::Error => "timeSensitive",
        }
    }

    fn decorate_title(level: NotifyLevel, title: &str) -> String {
        match level {
            NotifyLevel::Info => title.to_string(),
            NotifyLevel::Success => format!("[ok] {}", title),
            NotifyLevel::Warning => format!("[warn] {}", title),
            NotifyLevel::Error => format!("[error] {}", title),
        }
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    async fn send(&self, level: NotifyLevel, title: &str, body: &str) -> Result<()> {
        let title = Self::decorate_title(level, title);
        let request = PushRequest {
            device_key: &self.config.device_key,
            title: &title,
            body,
            group: &self.config.group,
            level: Self::interruption_level(level),
        };

        let response = self
            .client
            .post(self.api_url())
            .json(&request)
            .send()
            .await
            .context("Failed to send Bark notification")?;

        let result: PushResponse = response
            .json()
            .await
            .context("Failed to parse Bark response")?;

        if result.code != 200 {
            anyhow::bail!(
                "Bark API error ({}): {}",
                result.code,
                result.message.unwrap_or_default()
            );
        }

        Ok(())
    }
}
