// Leaderboard - ranks authors by how often they have mentioned moderators.
// Read-only over the mention history, independent of the detection pipeline.

use crate::core::mentions::{HistoryError, HistoryStore};
use crate::core::notifications::format_count;
use thiserror::Error;

/// How many authors make it onto the table.
pub const LEADERBOARD_SIZE: usize = 10;
pub const LEADERBOARD_SUBJECT: &str = "Moderator Mentions Leaderboard";
const APP_LINK: &str = "https://developers.reddit.com/apps/mod-mentions";

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("No users tracked yet, unable to generate leaderboard")]
    Empty,

    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct Leaderboard {
    /// Top authors, best first
    pub entries: Vec<LeaderboardEntry>,
    /// Every author with history, not just the ones shown
    pub total_tracked: usize,
}

impl Leaderboard {
    /// Markdown table of the ranked entries.
    pub fn render_table(&self) -> String {
        let mut table = String::from("|**Rank**|**Username**|**Count**|\n|--:|:--|:--|\n");
        for entry in &self.entries {
            table.push_str(&format!(
                "|{}|u/{}|{}|\n",
                entry.rank,
                entry.username,
                format_count(entry.count)
            ));
        }
        table
    }

    /// Full modmail body with heading and footer.
    pub fn render_message(&self, community: &str, requested_by: &str) -> String {
        format!(
            "###### Most Moderator Mentions in r/{community}\n\n\
             {table}\n\
             ^(Tracking {tracked} users in r/{community}. Generated by) \
             [^Moderator ^Mentions]({APP_LINK})^(. Requested by u/{requested_by}.)",
            table = self.render_table(),
            tracked = format_count(self.total_tracked as u64),
        )
    }
}

pub struct LeaderboardService<H: HistoryStore> {
    history: H,
}

impl<H: HistoryStore> LeaderboardService<H> {
    pub fn new(history: H) -> Self {
        Self { history }
    }

    /// Build the current top-10 leaderboard.
    pub async fn build(&self) -> Result<Leaderboard, LeaderboardError> {
        let ranked = self.history.ranked_by_count().await?;
        if ranked.is_empty() {
            return Err(LeaderboardError::Empty);
        }

        let entries = ranked
            .iter()
            .take(LEADERBOARD_SIZE)
            .enumerate()
            .map(|(i, (username, count))| LeaderboardEntry {
                rank: i + 1,
                username: username.clone(),
                count: *count,
            })
            .collect();

        Ok(Leaderboard {
            entries,
            total_tracked: ranked.len(),
        })
    }
}
