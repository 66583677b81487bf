use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::core::mentions::{ContentItem, ContentKind, ContentLookup};
use crate::core::moderators::{DirectoryError, ModeratorSource};
use crate::core::notifications::{ActionError, ContentActions};

pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";

/// Listing pages we follow before giving up on a modlist.
const MAX_MODERATOR_PAGES: usize = 20;

/// Upper bound on any single Reddit call. Lookups and modlist fetches run
/// while per-author and per-community locks are held.
const REDDIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reddit REST client. Only exposes the calls the core layer needs.
pub struct RedditApiClient {
    client: Client,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(
        access_token: &str,
        user_agent: &str,
        base_url: impl Into<String>,
    ) -> Result<Self, ActionError> {
        Self::with_timeout(access_token, user_agent, base_url, REDDIT_TIMEOUT)
    }

    pub fn with_timeout(
        access_token: &str,
        user_agent: &str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ActionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| ActionError(e.to_string()))?,
        );
        headers.insert(
            "User-Agent",
            HeaderValue::from_str(user_agent).map_err(|e| ActionError(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<(), ActionError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| ActionError(e.to_string()))?;

        check_status(resp, path).await?;
        Ok(())
    }

    async fn fetch_moderator_page(
        &self,
        community: &str,
        after: Option<&str>,
    ) -> Result<ApiListing<ApiModerator>, String> {
        let url = format!("{}/r/{}/about/moderators", self.base_url, community);
        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", "100"), ("raw_json", "1")]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let resp = request.send().await.map_err(|e| e.to_string())?;
        let resp = check_status(resp, "about/moderators")
            .await
            .map_err(|e| e.to_string())?;

        resp.json::<ApiThing<ApiListing<ApiModerator>>>()
            .await
            .map(|thing| thing.data)
            .map_err(|e| e.to_string())
    }
}

async fn check_status(resp: Response, what: &str) -> Result<Response, ActionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ActionError(format!(
        "Reddit returned {} for {}: {}",
        status, what, body
    )))
}

#[async_trait]
impl ModeratorSource for RedditApiClient {
    async fn fetch_moderators(&self, community: &str) -> Result<Vec<String>, DirectoryError> {
        let moderators = collect_moderators(community, MAX_MODERATOR_PAGES, |after| async move {
            self.fetch_moderator_page(community, after.as_deref()).await
        })
        .await?;

        tracing::debug!(community, count = moderators.len(), "Fetched modlist");
        Ok(moderators)
    }
}

#[async_trait]
impl ContentLookup for RedditApiClient {
    async fn fetch_content(&self, id: &str) -> Result<ContentItem, ActionError> {
        let url = format!("{}/api/info", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("id", id), ("raw_json", "1")])
            .send()
            .await
            .map_err(|e| ActionError(e.to_string()))?;
        let resp = check_status(resp, "api/info").await?;

        let listing: ApiThing<ApiListing<ApiThing<ApiContent>>> = resp
            .json()
            .await
            .map_err(|e| ActionError(e.to_string()))?;

        listing
            .data
            .children
            .into_iter()
            .next()
            .map(|thing| map_content(id, thing.data))
            .ok_or_else(|| ActionError(format!("{} not found", id)))
    }
}

#[async_trait]
impl ContentActions for RedditApiClient {
    async fn report(&self, item: &ContentItem, reason: &str) -> Result<(), ActionError> {
        self.post_form("/api/report", &[("thing_id", item.id.as_str()), ("reason", reason)])
            .await
    }

    async fn lock(&self, item: &ContentItem) -> Result<(), ActionError> {
        self.post_form("/api/lock", &[("id", item.id.as_str())]).await
    }

    async fn remove(&self, item: &ContentItem) -> Result<(), ActionError> {
        self.post_form("/api/remove", &[("id", item.id.as_str()), ("spam", "false")])
            .await
    }

    async fn send_modmail(
        &self,
        community: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ActionError> {
        self.post_form(
            "/api/mod/conversations",
            &[
                ("srName", community),
                ("subject", subject),
                ("body", body),
                ("isAuthorHidden", "false"),
            ],
        )
        .await
    }
}

/// Follow `after` cursors until the listing ends.
///
/// A modlist that is still paging after `max_pages` is an error rather than a
/// truncated list, since the caller replaces its whole cache with the result.
async fn collect_moderators<F, Fut>(
    community: &str,
    max_pages: usize,
    mut fetch_page: F,
) -> Result<Vec<String>, DirectoryError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ApiListing<ApiModerator>, String>>,
{
    let fetch_failed = |reason: String| DirectoryError::DirectoryFetchFailed {
        community: community.to_string(),
        reason,
    };

    let mut moderators = Vec::new();
    let mut after: Option<String> = None;

    for _ in 0..max_pages {
        let page = fetch_page(after.take()).await.map_err(fetch_failed)?;
        moderators.extend(page.children.into_iter().filter_map(|m| m.name));

        match page.after {
            Some(next) if !next.is_empty() => after = Some(next),
            _ => return Ok(moderators),
        }
    }

    Err(fetch_failed(format!(
        "modlist still paging after {} pages",
        max_pages
    )))
}

fn map_content(id: &str, api: ApiContent) -> ContentItem {
    let kind = ContentKind::from_id(id);
    let (title, body) = match kind {
        ContentKind::Post => (api.title, api.selftext),
        ContentKind::Comment => (None, api.body),
    };

    ContentItem {
        id: api.name.unwrap_or_else(|| id.to_string()),
        kind,
        author_name: api.author.unwrap_or_else(|| "[deleted]".to_string()),
        subreddit_name: api.subreddit.unwrap_or_default(),
        subreddit_id: api.subreddit_id.unwrap_or_default(),
        permalink: api.permalink.unwrap_or_default(),
        title,
        body,
    }
}

// ============================================================================
// API SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiThing<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ApiListing<T> {
    #[serde(default = "Vec::new")]
    children: Vec<T>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiModerator {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    name: Option<String>,
    author: Option<String>,
    subreddit: Option<String>,
    subreddit_id: Option<String>,
    permalink: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    body: Option<String>,
}
