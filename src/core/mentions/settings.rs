// Per-community notification settings.
//
// Loaded and validated once at startup, then shared read-only.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const SLACK_WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";
pub const DISCORD_WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Must be valid Slack or Discord webhook URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which chat service the configured webhook points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTarget {
    Slack,
    Discord,
}

/// App settings for one installation. Keys match the settings form (camelCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Skip content written by moderators entirely
    pub ignore_moderators_to_moderators: bool,
    /// Only count `u/name` and `/u/name`, not a bare `name`
    pub require_prefix: bool,
    /// Comma-separated usernames that never trigger, with or without `u/`
    pub excluded_mods: String,
    pub report_content: bool,
    pub lock_content: bool,
    pub remove_content: bool,
    pub modmail_content: bool,
    #[serde(rename = "webhookURL")]
    pub webhook_url: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            ignore_moderators_to_moderators: true,
            require_prefix: true,
            excluded_mods: String::new(),
            report_content: true,
            lock_content: false,
            remove_content: false,
            modmail_content: false,
            webhook_url: String::new(),
        }
    }
}

impl NotificationSettings {
    /// Parse settings JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject webhook URLs that are neither Slack nor Discord.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        self.webhook_url = self.webhook_url.trim().to_string();
        if !self.webhook_url.is_empty() && self.webhook_target().is_none() {
            return Err(SettingsError::InvalidWebhookUrl(self.webhook_url));
        }
        Ok(self)
    }

    pub fn webhook_target(&self) -> Option<WebhookTarget> {
        if self.webhook_url.starts_with(SLACK_WEBHOOK_PREFIX) {
            Some(WebhookTarget::Slack)
        } else if self.webhook_url.starts_with(DISCORD_WEBHOOK_PREFIX) {
            Some(WebhookTarget::Discord)
        } else {
            None
        }
    }

    /// The configured exclusions, lower-cased with `u/` and `/u/` tags and
    /// whitespace stripped.
    pub fn excluded_usernames(&self) -> Vec<String> {
        let stripped: String = self
            .excluded_mods
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        stripped
            .replace("/u/", "")
            .replace("u/", "")
            .to_lowercase()
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}
