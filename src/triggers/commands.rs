// Moderator-invoked commands and the shared handler state.

use crate::core::leaderboard::{LeaderboardError, LeaderboardService, LEADERBOARD_SUBJECT};
use crate::core::mentions::{HistoryStore, MentionService};
use crate::core::moderators::{DirectoryStore, ModeratorSource};
use crate::core::notifications::ContentActions;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type SharedHistory = Arc<dyn HistoryStore>;
pub type SharedDirectory = Arc<dyn DirectoryStore>;
pub type SharedSource = Arc<dyn ModeratorSource>;

/// Everything a trigger handler can reach.
pub struct Data {
    pub community: String,
    pub mentions: Arc<MentionService<SharedHistory, SharedDirectory, SharedSource>>,
    pub leaderboard: Arc<LeaderboardService<SharedHistory>>,
    pub actions: Arc<dyn ContentActions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Success,
    Neutral,
}

/// Short status line shown to the moderator who ran a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub appearance: Appearance,
    pub text: &'static str,
}

impl Toast {
    fn success(text: &'static str) -> Self {
        Self {
            appearance: Appearance::Success,
            text,
        }
    }

    fn neutral(text: &'static str) -> Self {
        Self {
            appearance: Appearance::Neutral,
            text,
        }
    }
}

/// Build the top-10 leaderboard and send it to the mod inbox.
pub async fn leaderboard(data: &Data, requested_by: &str) -> Result<Toast, Error> {
    tracing::info!(requested_by, "Leaderboard requested");

    let board = match data.leaderboard.build().await {
        Ok(board) => board,
        Err(LeaderboardError::Empty) => {
            tracing::error!("Unable to generate leaderboard, no users tracked yet");
            return Ok(Toast::neutral(
                "No users tracked yet, unable to generate leaderboard!",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let body = board.render_message(&data.community, requested_by);
    match data
        .actions
        .send_modmail(&data.community, LEADERBOARD_SUBJECT, &body)
        .await
    {
        Ok(()) => {
            tracing::info!(community = %data.community, "Sent modmail with leaderboard");
            Ok(Toast::success("Check Modmail for the leaderboard!"))
        }
        Err(e) => {
            tracing::error!(community = %data.community, error = %e, "Error sending leaderboard modmail");
            Ok(Toast::neutral("Error generating leaderboard!"))
        }
    }
}
