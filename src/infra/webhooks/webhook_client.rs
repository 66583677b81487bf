use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::core::notifications::{ActionError, WebhookSender};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts JSON payloads to Slack or Discord incoming webhooks.
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new() -> Result<Self, ActionError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| ActionError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for WebhookClient {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<(), ActionError> {
        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ActionError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ActionError(format!("Webhook returned {}: {}", status, body)));
        }
        Ok(())
    }
}
