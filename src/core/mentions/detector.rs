// Mention detection - exclusion-aware watch list plus exact-boundary matching.
//
// A mention is `u/name` or `/u/name` where neither side touches a word
// character or a slash, so `u/spez` never matches inside `u/spez_bot` or
// `u/myspez`. Markdown-escaped underscores (`\_`) count as underscores.
//
// NO Reddit API dependencies here - just text and the cached modlist.

use super::mention_models::MatchResult;
use super::settings::NotificationSettings;
use crate::core::moderators::ModeratorDirectory;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Reddit's rule bot. Its content is never scanned and it is never watched.
pub const AUTOMODERATOR: &str = "AutoModerator";

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("All moderators are excluded: {}", .0.join(", "))]
    AllModeratorsExcluded(Vec<String>),

    #[error("Invalid mention pattern for u/{username}: {source}")]
    Pattern {
        username: String,
        source: regex::Error,
    },
}

/// Build the case-insensitive boundary matcher for one username.
///
/// With `require_prefix` off the `u/` tag becomes optional, but a bare name
/// still has to stand alone.
pub fn build_boundary_pattern(username: &str, require_prefix: bool) -> Result<Regex, regex::Error> {
    // regex::escape never emits `_`, so this only touches the username's own underscores.
    let name = regex::escape(username).replace('_', r"(?:\\_|_)");
    let prefix = if require_prefix {
        "(?:/?u/)"
    } else {
        "(?:/?u/)?"
    };

    // A trailing `\_` is a markdown-escaped underscore, so the name keeps going.
    RegexBuilder::new(&format!(
        r"(?:^|[^a-zA-Z0-9_/]){prefix}{name}(?:$|[^a-zA-Z0-9_/\\]|\\$|\\[^_])"
    ))
    .case_insensitive(true)
    .build()
}

/// Result of running detection over one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The author is a moderator and moderator-to-moderator mentions are ignored
    ModeratorAuthor,
    Scanned(MatchResult),
}

pub struct MentionDetector {
    /// The app's own account, always excluded
    app_account: String,
    /// Compiled patterns keyed by (username, require_prefix)
    patterns: DashMap<(String, bool), Regex>,
}

impl MentionDetector {
    pub fn new(app_account: impl Into<String>) -> Self {
        Self {
            app_account: app_account.into(),
            patterns: DashMap::new(),
        }
    }

    /// Lower-cased usernames that can never be mentioned by `author`.
    pub fn exclusions(&self, author: &str, settings: &NotificationSettings) -> Vec<String> {
        let mut excluded = settings.excluded_usernames();
        excluded.push(self.app_account.to_lowercase());
        excluded.push(AUTOMODERATOR.to_lowercase());
        // Self-mentions never count
        excluded.push(author.to_lowercase());
        excluded
    }

    /// Directory usernames eligible for detection, in directory order.
    pub fn watch_list(
        &self,
        directory: &ModeratorDirectory,
        author: &str,
        settings: &NotificationSettings,
    ) -> Result<Vec<String>, DetectionError> {
        let excluded = self.exclusions(author, settings);
        let watch_list: Vec<String> = directory
            .moderators()
            .iter()
            .filter(|m| !excluded.contains(&m.to_lowercase()))
            .cloned()
            .collect();

        if watch_list.is_empty() {
            return Err(DetectionError::AllModeratorsExcluded(excluded));
        }
        Ok(watch_list)
    }

    /// Find every watched moderator mentioned in `text`.
    pub fn detect(
        &self,
        text: &str,
        author: &str,
        directory: &ModeratorDirectory,
        settings: &NotificationSettings,
    ) -> Result<Detection, DetectionError> {
        let watch_list = self.watch_list(directory, author, settings)?;

        if settings.ignore_moderators_to_moderators && directory.contains(author) {
            return Ok(Detection::ModeratorAuthor);
        }

        let mut moderators = Vec::new();
        for moderator in watch_list {
            if self.pattern(&moderator, settings.require_prefix)?.is_match(text) {
                moderators.push(moderator);
            }
        }

        Ok(Detection::Scanned(MatchResult { moderators }))
    }

    fn pattern(&self, username: &str, require_prefix: bool) -> Result<Regex, DetectionError> {
        let key = (username.to_string(), require_prefix);
        if let Some(pattern) = self.patterns.get(&key) {
            return Ok(pattern.clone());
        }

        let pattern = build_boundary_pattern(username, require_prefix).map_err(|source| {
            DetectionError::Pattern {
                username: username.to_string(),
                source,
            }
        })?;
        self.patterns.insert(key, pattern.clone());
        Ok(pattern)
    }
}
