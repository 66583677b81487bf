// Notification dispatcher - fans one detected mention out to every enabled channel.
//
// Each channel runs concurrently inside its own failure boundary. A failing
// channel is logged and reported in the summary, the others still run, and
// nothing is propagated to the caller.

use super::formatting::{
    discord_payload, modmail_body, modmail_subject, report_reason, slack_payload, MentionNotice,
};
use crate::core::mentions::{ContentItem, NotificationSettings, WebhookTarget};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// PORTS
// ============================================================================

/// Failure reported by an external action (Reddit API call or webhook POST).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

/// Moderation actions on the content platform.
#[async_trait]
pub trait ContentActions: Send + Sync {
    async fn report(&self, item: &ContentItem, reason: &str) -> Result<(), ActionError>;
    async fn lock(&self, item: &ContentItem) -> Result<(), ActionError>;
    async fn remove(&self, item: &ContentItem) -> Result<(), ActionError>;
    /// Start a modmail conversation in the community's mod inbox.
    async fn send_modmail(
        &self,
        community: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ActionError>;
}

/// Outbound JSON webhooks.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<(), ActionError>;
}

// ============================================================================
// DISPATCH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Report,
    Lock,
    Remove,
    Modmail,
    Slack,
    Discord,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Report => write!(f, "report"),
            Channel::Lock => write!(f, "lock"),
            Channel::Remove => write!(f, "remove"),
            Channel::Modmail => write!(f, "modmail"),
            Channel::Slack => write!(f, "slack"),
            Channel::Discord => write!(f, "discord"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Error sending {channel} for {content_id}: {reason}")]
    ChannelDispatchFailed {
        channel: Channel,
        content_id: String,
        reason: String,
    },
}

/// Which channels ran and how they went.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub delivered: Vec<Channel>,
    pub failed: Vec<DispatchError>,
}

impl DispatchSummary {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct NotificationDispatcher {
    actions: Arc<dyn ContentActions>,
    webhooks: Arc<dyn WebhookSender>,
}

impl NotificationDispatcher {
    pub fn new(actions: Arc<dyn ContentActions>, webhooks: Arc<dyn WebhookSender>) -> Self {
        Self { actions, webhooks }
    }

    /// Run every channel the settings enable. Never fails.
    pub async fn dispatch(
        &self,
        notice: &MentionNotice,
        settings: &NotificationSettings,
    ) -> DispatchSummary {
        let item = &notice.item;
        let target = settings.webhook_target();
        let url = settings.webhook_url.as_str();

        let reason = report_reason(notice);
        let subject = modmail_subject(notice);
        let body = modmail_body(notice);
        let slack = slack_payload(notice);
        let discord = discord_payload(notice);

        let results = tokio::join!(
            attempt(
                Channel::Report,
                item,
                settings.report_content,
                self.actions.report(item, &reason),
            ),
            attempt(
                Channel::Lock,
                item,
                settings.lock_content,
                self.actions.lock(item),
            ),
            attempt(
                Channel::Remove,
                item,
                settings.remove_content,
                self.actions.remove(item),
            ),
            attempt(
                Channel::Modmail,
                item,
                settings.modmail_content,
                self.actions
                    .send_modmail(&item.subreddit_name, &subject, &body),
            ),
            attempt(
                Channel::Slack,
                item,
                target == Some(WebhookTarget::Slack),
                self.webhooks.post_json(url, &slack),
            ),
            attempt(
                Channel::Discord,
                item,
                target == Some(WebhookTarget::Discord),
                self.webhooks.post_json(url, &discord),
            ),
        );

        let mut summary = DispatchSummary::default();
        for result in [results.0, results.1, results.2, results.3, results.4, results.5]
            .into_iter()
            .flatten()
        {
            match result {
                Ok(channel) => summary.delivered.push(channel),
                Err(err) => summary.failed.push(err),
            }
        }
        summary
    }
}

/// Run one channel if enabled, logging the outcome.
///
/// The action future is only polled when the channel is enabled.
async fn attempt(
    channel: Channel,
    item: &ContentItem,
    enabled: bool,
    action: impl Future<Output = Result<(), ActionError>>,
) -> Option<Result<Channel, DispatchError>> {
    if !enabled {
        return None;
    }

    match action.await {
        Ok(()) => {
            tracing::info!(content_id = %item.id, %channel, "Notification sent");
            Some(Ok(channel))
        }
        Err(err) => {
            let err = DispatchError::ChannelDispatchFailed {
                channel,
                content_id: item.id.clone(),
                reason: err.to_string(),
            };
            tracing::error!(content_id = %item.id, %channel, error = %err, "Notification failed");
            Some(Err(err))
        }
    }
}
