// Entry point of the moderator mention service.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (storage, Reddit API, webhooks)
// - `triggers/` = Inbound adapter (trigger events and commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Read trigger events and hand each one to its own task

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "triggers/triggers_layer.rs"]
mod triggers;

use crate::config::{AppConfig, StorageBackend};
use crate::core::leaderboard::LeaderboardService;
use crate::core::mentions::{MentionDetector, MentionService};
use crate::core::moderators::ModeratorDirectoryCache;
use crate::core::notifications::NotificationDispatcher;
use crate::infra::reddit::RedditApiClient;
use crate::infra::storage::{InMemoryStore, SqliteStore};
use crate::infra::webhooks::WebhookClient;
use crate::triggers::commands::{SharedDirectory, SharedHistory, SharedSource};
use crate::triggers::events::{handle_event, parse_event};
use crate::triggers::Data;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let (history, directory_store): (SharedHistory, SharedDirectory) = match &config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, mention history is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            let history: SharedHistory = store.clone();
            let directory: SharedDirectory = store;
            (history, directory)
        }
        StorageBackend::Sqlite { path } => {
            let store = Arc::new(SqliteStore::new(&path.to_string_lossy()).await?);
            tracing::info!(path = %path.display(), "Opened SQLite store");
            let history: SharedHistory = store.clone();
            let directory: SharedDirectory = store;
            (history, directory)
        }
    };

    let reddit = Arc::new(RedditApiClient::new(
        &config.reddit_access_token,
        &config.reddit_user_agent,
        config.reddit_api_base.clone(),
    )?);
    let webhooks = Arc::new(WebhookClient::new()?);

    let source: SharedSource = reddit.clone();
    let directory = Arc::new(ModeratorDirectoryCache::new(directory_store, source));

    let mention_service = Arc::new(MentionService::new(
        config.community.clone(),
        Arc::new(config.settings.clone()),
        history.clone(),
        directory,
        MentionDetector::new(config.app_account.clone()),
        reddit.clone(),
        NotificationDispatcher::new(reddit.clone(), webhooks),
    ));
    let leaderboard_service = Arc::new(LeaderboardService::new(history));

    let data = Arc::new(Data {
        community: config.community.clone(),
        mentions: Arc::clone(&mention_service),
        leaderboard: Arc::clone(&leaderboard_service),
        actions: reddit,
    });

    // ========================================================================
    // EVENT LOOP
    // ========================================================================
    // One JSON trigger envelope per line. Each event runs in its own task so a
    // slow Reddit call never holds up the next event.

    tracing::info!(community = %config.community, "Listening for trigger events on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match parse_event(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Invalid trigger event");
                continue;
            }
        };

        let data = Arc::clone(&data);
        tasks.spawn(async move {
            let name = event.name();
            match handle_event(&data, event).await {
                Ok(handled) => tracing::debug!(event = name, ?handled, "Trigger handled"),
                Err(e) => tracing::error!(event = name, error = %e, "Trigger failed"),
            }
        });

        // Reap finished tasks so the set doesn't grow without bound
        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}
    tracing::info!("Input closed, shutting down");
    Ok(())
}
