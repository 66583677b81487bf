// Mention domain models.
//
// These are pure domain types with no Reddit API dependencies. The triggers
// layer builds ContentEvents from raw trigger payloads and the infra layer
// builds ContentItems from API responses.

use crate::core::notifications::DispatchSummary;

/// Fullname prefix Reddit uses for posts (links). Everything else we see is a comment.
pub const POST_PREFIX: &str = "t3_";

/// Whether a piece of content is a post or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Comment,
}

impl ContentKind {
    /// Derive the kind from a Reddit fullname (`t3_...` or `t1_...`).
    pub fn from_id(id: &str) -> Self {
        if id.starts_with(POST_PREFIX) {
            ContentKind::Post
        } else {
            ContentKind::Comment
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Post => write!(f, "post"),
            ContentKind::Comment => write!(f, "comment"),
        }
    }
}

/// A submitted or edited post/comment, reduced to what detection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEvent {
    /// Reddit fullname, `t3_` for posts and `t1_` for comments
    pub id: String,
    pub author_name: String,
    /// Post title and selftext joined by a space, or the comment body
    pub text: String,
    pub is_edit: bool,
}

impl ContentEvent {
    pub fn kind(&self) -> ContentKind {
        ContentKind::from_id(&self.id)
    }
}

/// The full content item, fetched once a mention is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub author_name: String,
    pub subreddit_name: String,
    pub subreddit_id: String,
    /// Site-relative permalink, e.g. `/r/rust/comments/abc/title/`
    pub permalink: String,
    /// Only posts have titles
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ContentItem {
    pub fn permalink_url(&self) -> String {
        format!("https://www.reddit.com{}", self.permalink)
    }

    /// Body text, treating an empty body like a missing one.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }
}

/// Directory usernames found mentioned in a text, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub moderators: Vec<String>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.moderators.is_empty()
    }
}

/// What happened to one content event.
#[derive(Debug)]
pub enum MentionOutcome {
    /// Authored by AutoModerator
    IgnoredAuthor,
    /// Content ID already in the author's history (edit redelivery)
    AlreadyTracked,
    /// Author is a moderator and moderator-to-moderator mentions are ignored
    ModeratorAuthor,
    NoMention,
    Mentioned {
        moderators: Vec<String>,
        /// The author's mention count after this event
        author_count: u64,
        dispatch: DispatchSummary,
    },
}
