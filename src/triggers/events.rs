// Trigger envelopes and their routing into the core.

use super::commands::{self, Data, Error, Toast};
use crate::core::mentions::{ContentEvent, MentionError, MentionOutcome, AUTOMODERATOR};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostPayload {
    pub author: Option<Author>,
    pub post: Option<Post>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentPayload {
    pub author: Option<Author>,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModActionPayload {
    pub action: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPayload {
    pub requested_by: String,
}

/// One inbound event, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TriggerEvent {
    PostSubmit(PostPayload),
    PostUpdate(PostPayload),
    CommentSubmit(CommentPayload),
    CommentUpdate(CommentPayload),
    ModAction(ModActionPayload),
    AppInstall,
    AppUpgrade,
    LeaderboardRequested(LeaderboardPayload),
}

impl TriggerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerEvent::PostSubmit(_) => "PostSubmit",
            TriggerEvent::PostUpdate(_) => "PostUpdate",
            TriggerEvent::CommentSubmit(_) => "CommentSubmit",
            TriggerEvent::CommentUpdate(_) => "CommentUpdate",
            TriggerEvent::ModAction(_) => "ModAction",
            TriggerEvent::AppInstall => "AppInstall",
            TriggerEvent::AppUpgrade => "AppUpgrade",
            TriggerEvent::LeaderboardRequested(_) => "LeaderboardRequested",
        }
    }
}

/// Result of handling one trigger, for logging at the call site.
#[derive(Debug)]
pub enum Handled {
    Content(MentionOutcome),
    ModAction { refreshed: bool },
    AppChanged { moderators: usize },
    Command(Toast),
}

pub fn parse_event(line: &str) -> Result<TriggerEvent, serde_json::Error> {
    serde_json::from_str(line)
}

pub async fn handle_event(data: &Data, event: TriggerEvent) -> Result<Handled, Error> {
    match event {
        TriggerEvent::PostSubmit(payload) => on_post(data, payload, false).await,
        TriggerEvent::PostUpdate(payload) => on_post(data, payload, true).await,
        TriggerEvent::CommentSubmit(payload) => on_comment(data, payload, false).await,
        TriggerEvent::CommentUpdate(payload) => on_comment(data, payload, true).await,
        TriggerEvent::ModAction(payload) => {
            let action = payload.action.ok_or(MentionError::MissingField("action"))?;
            let refreshed = data.mentions.handle_mod_action(&action).await?;
            Ok(Handled::ModAction { refreshed })
        }
        TriggerEvent::AppInstall | TriggerEvent::AppUpgrade => {
            let directory = data.mentions.handle_app_changed().await?;
            Ok(Handled::AppChanged {
                moderators: directory.moderators().len(),
            })
        }
        TriggerEvent::LeaderboardRequested(payload) => {
            let toast = commands::leaderboard(data, &payload.requested_by).await?;
            Ok(Handled::Command(toast))
        }
    }
}

fn log_outcome(outcome: &MentionOutcome) {
    if let MentionOutcome::Mentioned {
        moderators,
        author_count,
        dispatch,
    } = outcome
    {
        tracing::info!(
            moderators = %moderators.join(", "),
            author_count,
            delivered = dispatch.delivered.len(),
            failed = dispatch.failed.len(),
            "Mention handled"
        );
    }
}

fn author_name(author: Option<Author>) -> Result<String, MentionError> {
    author
        .and_then(|a| a.name)
        .filter(|name| !name.is_empty())
        .ok_or(MentionError::MissingField("authorName"))
}

async fn on_post(data: &Data, payload: PostPayload, is_edit: bool) -> Result<Handled, Error> {
    let author_name = author_name(payload.author)?;
    if author_name == AUTOMODERATOR {
        return Ok(Handled::Content(MentionOutcome::IgnoredAuthor));
    }
    let post = payload.post.ok_or(MentionError::MissingField("post"))?;

    let event = ContentEvent {
        text: format!("{} {}", post.title, post.selftext),
        id: post.id,
        author_name,
        is_edit,
    };
    let outcome = data.mentions.handle_content(event).await?;
    log_outcome(&outcome);
    Ok(Handled::Content(outcome))
}

async fn on_comment(data: &Data, payload: CommentPayload, is_edit: bool) -> Result<Handled, Error> {
    let author_name = author_name(payload.author)?;
    if author_name == AUTOMODERATOR {
        return Ok(Handled::Content(MentionOutcome::IgnoredAuthor));
    }
    let comment = payload.comment.ok_or(MentionError::MissingField("comment"))?;

    let event = ContentEvent {
        id: comment.id,
        author_name,
        text: comment.body,
        is_edit,
    };
    let outcome = data.mentions.handle_content(event).await?;
    log_outcome(&outcome);
    Ok(Handled::Content(outcome))
}
