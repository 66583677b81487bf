// Moderator directory domain types.
//
// Pure data, no HTTP or storage types. The infra layer feeds plain username
// lists in and gets plain username lists back.

use thiserror::Error;

/// Moderation-log actions that change who is on the modlist.
/// Anything else coming off the audit log leaves the cache alone.
pub const MODLIST_CHANGING_ACTIONS: [&str; 4] = [
    "acceptmoderatorinvite",
    "addmoderator",
    "removemoderator",
    "reordermoderators",
];

/// Whether a moderation-log action should invalidate the cached modlist.
pub fn invalidates_modlist(action: &str) -> bool {
    MODLIST_CHANGING_ACTIONS.contains(&action)
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Fetched modlist for r/{0} is empty, skipping cache update")]
    DirectoryEmpty(String),

    #[error("Error fetching modlist for r/{community}: {reason}")]
    DirectoryFetchFailed { community: String, reason: String },

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// The moderators of one community, in modlist order.
///
/// Once built by a refresh this always ends with the community's
/// `<name>-ModTeam` account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeratorDirectory {
    community: String,
    moderators: Vec<String>,
}

impl ModeratorDirectory {
    /// Wrap a list that was already cached (team account included).
    pub fn new(community: impl Into<String>, moderators: Vec<String>) -> Self {
        Self {
            community: community.into(),
            moderators,
        }
    }

    /// Build a directory from a freshly fetched modlist, appending the team account.
    pub fn from_fetched(community: &str, mut fetched: Vec<String>) -> Self {
        fetched.push(team_account(community));
        Self::new(community, fetched)
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    pub fn moderators(&self) -> &[String] {
        &self.moderators
    }

    /// Case-insensitive membership check.
    pub fn contains(&self, username: &str) -> bool {
        self.moderators
            .iter()
            .any(|m| m.eq_ignore_ascii_case(username))
    }
}

/// The synthetic account Reddit uses for messages sent "as the mod team".
pub fn team_account(community: &str) -> String {
    format!("{}-ModTeam", community)
}
