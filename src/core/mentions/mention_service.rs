// Mention service - orchestrates one content event end to end.
//
// event -> dedup check -> modlist (refresh on miss) -> detection
//       -> record in history -> notification fan-out
//
// Detection and bookkeeping failures abort the event. Notification failures
// never do, the dispatcher only logs them.

use super::detector::{Detection, DetectionError, MentionDetector, AUTOMODERATOR};
use super::history::{HistoryError, HistoryStore};
use super::mention_models::{ContentEvent, ContentItem, MentionOutcome};
use super::settings::NotificationSettings;
use crate::core::keyed_lock::KeyedLock;
use crate::core::moderators::{
    invalidates_modlist, DirectoryError, DirectoryStore, ModeratorDirectory,
    ModeratorDirectoryCache, ModeratorSource,
};
use crate::core::notifications::{ActionError, MentionNotice, NotificationDispatcher};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum MentionError {
    #[error("Missing {0} in trigger event")]
    MissingField(&'static str),

    #[error("Modlist for r/{0} is unavailable after refresh")]
    ModlistUnavailable(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error("Failed to fetch {id}: {source}")]
    ContentLookup { id: String, source: ActionError },
}

// ============================================================================
// PORTS
// ============================================================================

/// Resolves a content ID to the full post or comment.
#[async_trait]
pub trait ContentLookup: Send + Sync {
    async fn fetch_content(&self, id: &str) -> Result<ContentItem, ActionError>;
}

// ============================================================================
// SERVICE
// ============================================================================

/// Result of the locked part of `handle_content`.
enum Tracked {
    Skipped(MentionOutcome),
    New {
        moderators: Vec<String>,
        item: ContentItem,
        author_count: u64,
    },
}

pub struct MentionService<H: HistoryStore, S: DirectoryStore, F: ModeratorSource> {
    community: String,
    settings: Arc<NotificationSettings>,
    history: H,
    directory: Arc<ModeratorDirectoryCache<S, F>>,
    detector: MentionDetector,
    lookup: Arc<dyn ContentLookup>,
    dispatcher: NotificationDispatcher,
    author_locks: KeyedLock,
}

impl<H: HistoryStore, S: DirectoryStore, F: ModeratorSource> MentionService<H, S, F> {
    pub fn new(
        community: impl Into<String>,
        settings: Arc<NotificationSettings>,
        history: H,
        directory: Arc<ModeratorDirectoryCache<S, F>>,
        detector: MentionDetector,
        lookup: Arc<dyn ContentLookup>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            community: community.into(),
            settings,
            history,
            directory,
            detector,
            lookup,
            dispatcher,
            author_locks: KeyedLock::new(),
        }
    }

    /// Check a submitted or edited post/comment for moderator mentions.
    pub async fn handle_content(&self, event: ContentEvent) -> Result<MentionOutcome, MentionError> {
        if event.author_name == AUTOMODERATOR {
            return Ok(MentionOutcome::IgnoredAuthor);
        }

        let tracked = {
            // Held across the whole read-modify-write so concurrent deliveries
            // for one author can't double-count or lose an update.
            let _guard = self.author_locks.lock(&event.author_name).await;
            self.track(&event).await
        };
        self.author_locks.prune();

        let (moderators, item, author_count) = match tracked? {
            Tracked::Skipped(outcome) => return Ok(outcome),
            Tracked::New {
                moderators,
                item,
                author_count,
            } => (moderators, item, author_count),
        };

        tracing::info!(
            content_id = %item.id,
            author = %item.author_name,
            moderators = %moderators.join(", "),
            "Moderator mention detected"
        );
        if author_count > 1 {
            tracing::info!(
                author = %item.author_name,
                community = %item.subreddit_name,
                count = author_count,
                "Repeat mention"
            );
        }

        let notice = MentionNotice {
            moderators,
            item,
            author_count,
        };
        let dispatch = self.dispatcher.dispatch(&notice, &self.settings).await;
        tracing::debug!(
            content_id = %notice.item.id,
            attempted = dispatch.attempted(),
            failed = dispatch.failed.len(),
            "Notifications dispatched"
        );

        Ok(MentionOutcome::Mentioned {
            moderators: notice.moderators,
            author_count,
            dispatch,
        })
    }

    /// React to a moderation-log entry. Returns whether the modlist was refreshed.
    pub async fn handle_mod_action(&self, action: &str) -> Result<bool, MentionError> {
        if !invalidates_modlist(action) {
            tracing::debug!(action, "Ignoring mod action");
            return Ok(false);
        }

        tracing::info!(action, "Modlist changed, refreshing cache");
        self.directory.invalidate(&self.community).await?;
        Ok(true)
    }

    /// App installed or upgraded: start from a fresh modlist.
    pub async fn handle_app_changed(&self) -> Result<ModeratorDirectory, MentionError> {
        Ok(self.directory.invalidate(&self.community).await?)
    }

    /// Dedup, detect and record one event. Caller holds the author lock.
    async fn track(&self, event: &ContentEvent) -> Result<Tracked, MentionError> {
        let mut record = self.history.get(&event.author_name).await?;
        if record.contains(&event.id) {
            tracing::info!(
                content_id = %event.id,
                kind = %event.kind(),
                author = %event.author_name,
                is_edit = event.is_edit,
                "Already tracked, skipping"
            );
            return Ok(Tracked::Skipped(MentionOutcome::AlreadyTracked));
        }

        let directory = self.directory_or_refresh().await?;
        let result = match self.detector.detect(
            &event.text,
            &event.author_name,
            &directory,
            &self.settings,
        )? {
            Detection::ModeratorAuthor => {
                tracing::info!(
                    content_id = %event.id,
                    author = %event.author_name,
                    "Skipping, author is a moderator"
                );
                return Ok(Tracked::Skipped(MentionOutcome::ModeratorAuthor));
            }
            Detection::Scanned(result) if result.is_empty() => {
                return Ok(Tracked::Skipped(MentionOutcome::NoMention));
            }
            Detection::Scanned(result) => result,
        };

        let item = self.lookup.fetch_content(&event.id).await.map_err(|source| {
            MentionError::ContentLookup {
                id: event.id.clone(),
                source,
            }
        })?;

        record.record(&event.id);
        self.history.put(&event.author_name, &record).await?;

        Ok(Tracked::New {
            moderators: result.moderators,
            item,
            author_count: record.count,
        })
    }

    /// Cached modlist, with exactly one refresh attempt on a miss.
    async fn directory_or_refresh(&self) -> Result<ModeratorDirectory, MentionError> {
        if let Some(directory) = self.directory.get(&self.community).await? {
            return Ok(directory);
        }

        tracing::info!(community = %self.community, "Cached modlist is empty, attempting to refresh");
        self.directory.refresh(&self.community).await?;

        self.directory
            .get(&self.community)
            .await?
            .ok_or_else(|| MentionError::ModlistUnavailable(self.community.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mentions::{ContentKind, MentionHistoryRecord};
    use crate::core::notifications::{Channel, ContentActions, WebhookSender};
    use dashmap::DashMap;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ------------------------------------------------------------------
    // Mock ports
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MockHistoryStore {
        records: DashMap<String, MentionHistoryRecord>,
    }

    #[async_trait]
    impl HistoryStore for MockHistoryStore {
        async fn get(&self, author: &str) -> Result<MentionHistoryRecord, HistoryError> {
            let record = self
                .records
                .get(author)
                .map(|r| r.clone())
                .unwrap_or_default();
            // Widen the race window between get and put
            tokio::task::yield_now().await;
            Ok(record)
        }

        async fn put(
            &self,
            author: &str,
            record: &MentionHistoryRecord,
        ) -> Result<(), HistoryError> {
            self.records.insert(author.to_string(), record.clone());
            Ok(())
        }

        async fn counts(&self) -> Result<Vec<(String, u64)>, HistoryError> {
            Ok(self
                .records
                .iter()
                .map(|e| (e.key().clone(), e.value().count))
                .collect())
        }
    }

    #[derive(Default)]
    struct MockDirectoryStore {
        lists: DashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl DirectoryStore for MockDirectoryStore {
        async fn load_moderators(
            &self,
            community: &str,
        ) -> Result<Option<Vec<String>>, DirectoryError> {
            Ok(self.lists.get(community).map(|l| l.clone()))
        }

        async fn store_moderators(
            &self,
            community: &str,
            moderators: &[String],
        ) -> Result<(), DirectoryError> {
            self.lists.insert(community.to_string(), moderators.to_vec());
            Ok(())
        }

        async fn clear_moderators(&self, community: &str) -> Result<(), DirectoryError> {
            self.lists.remove(community);
            Ok(())
        }
    }

    struct MockSource {
        moderators: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModeratorSource for MockSource {
        async fn fetch_moderators(&self, _community: &str) -> Result<Vec<String>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.moderators.clone())
        }
    }

    /// Fake Reddit: resolves any ID and records every action.
    #[derive(Default)]
    struct FakeReddit {
        actions: Mutex<Vec<Channel>>,
        lookups: AtomicUsize,
    }

    impl FakeReddit {
        fn push(&self, channel: Channel) -> Result<(), ActionError> {
            self.actions.lock().unwrap().push(channel);
            Ok(())
        }

        fn actions(&self) -> Vec<Channel> {
            self.actions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentLookup for FakeReddit {
        async fn fetch_content(&self, id: &str) -> Result<ContentItem, ActionError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(ContentItem {
                id: id.to_string(),
                kind: ContentKind::from_id(id),
                author_name: "RegularUser".to_string(),
                subreddit_name: "test".to_string(),
                subreddit_id: "t5_test".to_string(),
                permalink: format!("/r/test/comments/{}/", id),
                title: None,
                body: Some("body".to_string()),
            })
        }
    }

    #[async_trait]
    impl ContentActions for FakeReddit {
        async fn report(&self, _item: &ContentItem, _reason: &str) -> Result<(), ActionError> {
            self.push(Channel::Report)
        }

        async fn lock(&self, _item: &ContentItem) -> Result<(), ActionError> {
            self.push(Channel::Lock)
        }

        async fn remove(&self, _item: &ContentItem) -> Result<(), ActionError> {
            self.push(Channel::Remove)
        }

        async fn send_modmail(
            &self,
            _community: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<(), ActionError> {
            self.push(Channel::Modmail)
        }
    }

    #[async_trait]
    impl WebhookSender for FakeReddit {
        async fn post_json(&self, _url: &str, _payload: &Value) -> Result<(), ActionError> {
            Err(ActionError("webhooks are not expected in these tests".to_string()))
        }
    }

    struct Harness {
        service: MentionService<Arc<MockHistoryStore>, MockDirectoryStore, Arc<MockSource>>,
        history: Arc<MockHistoryStore>,
        reddit: Arc<FakeReddit>,
        source: Arc<MockSource>,
        directory: Arc<ModeratorDirectoryCache<MockDirectoryStore, Arc<MockSource>>>,
    }

    fn harness(moderators: &[&str], settings: NotificationSettings) -> Harness {
        let history = Arc::new(MockHistoryStore::default());
        let reddit = Arc::new(FakeReddit::default());
        let source = Arc::new(MockSource {
            moderators: moderators.iter().map(|m| m.to_string()).collect(),
            calls: AtomicUsize::new(0),
        });
        let directory = Arc::new(ModeratorDirectoryCache::new(
            MockDirectoryStore::default(),
            Arc::clone(&source),
        ));
        let dispatcher = NotificationDispatcher::new(reddit.clone(), reddit.clone());
        let service = MentionService::new(
            "test",
            Arc::new(settings),
            Arc::clone(&history),
            Arc::clone(&directory),
            MentionDetector::new("mod-mentions"),
            reddit.clone(),
            dispatcher,
        );

        Harness {
            service,
            history,
            reddit,
            source,
            directory,
        }
    }

    fn comment(id: &str, author: &str, text: &str) -> ContentEvent {
        ContentEvent {
            id: id.to_string(),
            author_name: author.to_string(),
            text: text.to_string(),
            is_edit: false,
        }
    }

    async fn count_for(history: &MockHistoryStore, author: &str) -> u64 {
        history.get(author).await.unwrap().count
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_regular_user_mention_is_recorded() {
        let h = harness(&["Mod1", "Mod2", "Mod3"], NotificationSettings::default());

        let outcome = h
            .service
            .handle_content(comment("t1_a", "RegularUser", "I think u/Mod1 should see this"))
            .await
            .unwrap();

        match outcome {
            MentionOutcome::Mentioned {
                moderators,
                author_count,
                dispatch,
            } => {
                assert_eq!(moderators, vec!["Mod1"]);
                assert_eq!(author_count, 1);
                assert_eq!(dispatch.delivered, vec![Channel::Report]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(count_for(&h.history, "RegularUser").await, 1);
        assert_eq!(h.reddit.actions(), vec![Channel::Report]);
    }

    #[tokio::test]
    async fn test_moderator_to_moderator_ignored() {
        let h = harness(&["Mod1", "Mod2", "Mod3"], NotificationSettings::default());

        let outcome = h
            .service
            .handle_content(comment("t1_a", "Mod1", "Hey u/Mod2, what do you think?"))
            .await
            .unwrap();

        assert!(matches!(outcome, MentionOutcome::ModeratorAuthor));
        assert!(h.history.records.is_empty());
        assert!(h.reddit.actions().is_empty());
    }

    #[tokio::test]
    async fn test_moderator_to_moderator_allowed() {
        let settings = NotificationSettings {
            ignore_moderators_to_moderators: false,
            ..Default::default()
        };
        let h = harness(&["Mod1", "Mod2", "Mod3"], settings);

        let outcome = h
            .service
            .handle_content(comment("t1_a", "Mod1", "Hey u/Mod2, what do you think?"))
            .await
            .unwrap();

        match outcome {
            MentionOutcome::Mentioned { moderators, .. } => assert_eq!(moderators, vec!["Mod2"]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_all_excluded_has_no_side_effects() {
        let settings = NotificationSettings {
            excluded_mods: "Mod1, Mod2, Mod3".to_string(),
            ..Default::default()
        };
        let h = harness(&["Mod1", "Mod2", "Mod3"], settings);
        // The team account is always in the directory, exclude it too
        let settings_with_team = NotificationSettings {
            excluded_mods: "Mod1, Mod2, Mod3, test-ModTeam".to_string(),
            ..Default::default()
        };
        let h2 = harness(&["Mod1", "Mod2", "Mod3"], settings_with_team);

        let first = h
            .service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap();
        assert!(matches!(first, MentionOutcome::NoMention));

        let err = h2
            .service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MentionError::Detection(DetectionError::AllModeratorsExcluded(_))
        ));
        assert!(h2.history.records.is_empty());
        assert!(h2.reddit.actions().is_empty());
        assert_eq!(h2.reddit.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_noop() {
        let h = harness(&["Mod1"], NotificationSettings::default());
        let event = comment("t1_a", "RegularUser", "u/Mod1 look");

        h.service.handle_content(event.clone()).await.unwrap();
        let again = h
            .service
            .handle_content(ContentEvent {
                is_edit: true,
                ..event
            })
            .await
            .unwrap();

        assert!(matches!(again, MentionOutcome::AlreadyTracked));
        assert_eq!(count_for(&h.history, "RegularUser").await, 1);
        assert_eq!(h.reddit.actions(), vec![Channel::Report]);
    }

    #[tokio::test]
    async fn test_no_mention_is_not_tracked() {
        let h = harness(&["Mod1"], NotificationSettings::default());

        let outcome = h
            .service
            .handle_content(comment("t1_a", "RegularUser", "nothing to see, u/Mod1_fan"))
            .await
            .unwrap();

        assert!(matches!(outcome, MentionOutcome::NoMention));
        assert!(h.history.records.is_empty());
    }

    #[tokio::test]
    async fn test_automoderator_ignored_before_anything_else() {
        let h = harness(&["Mod1"], NotificationSettings::default());

        let outcome = h
            .service
            .handle_content(comment("t1_a", "AutoModerator", "u/Mod1"))
            .await
            .unwrap();

        assert!(matches!(outcome, MentionOutcome::IgnoredAuthor));
        assert!(h.directory.get("test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_refreshes_once() {
        let h = harness(&["Mod1"], NotificationSettings::default());
        assert!(h.directory.get("test").await.unwrap().is_none());

        h.service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap();
        h.service
            .handle_content(comment("t1_b", "RegularUser", "u/Mod1 again"))
            .await
            .unwrap();

        assert!(h.directory.get("test").await.unwrap().is_some());
        assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_modlist_aborts_event() {
        let h = harness(&[], NotificationSettings::default());

        let err = h
            .service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MentionError::Directory(DirectoryError::DirectoryEmpty(_))
        ));
        assert!(h.history.records.is_empty());
    }

    #[tokio::test]
    async fn test_repeat_offender_count_grows() {
        let h = harness(&["Mod1"], NotificationSettings::default());

        for (i, id) in ["t1_a", "t1_b", "t3_c"].iter().enumerate() {
            let outcome = h
                .service
                .handle_content(comment(id, "RegularUser", "u/Mod1"))
                .await
                .unwrap();
            match outcome {
                MentionOutcome::Mentioned { author_count, .. } => {
                    assert_eq!(author_count, i as u64 + 1)
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_count_once() {
        let h = Arc::new(harness(&["Mod1"], NotificationSettings::default()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let h = Arc::clone(&h);
            handles.push(tokio::spawn(async move {
                h.service
                    .handle_content(comment("t1_same", "RegularUser", "u/Mod1"))
                    .await
                    .map(|o| matches!(o, MentionOutcome::Mentioned { .. }))
            }));
        }

        let mut mentioned = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                mentioned += 1;
            }
        }

        assert_eq!(mentioned, 1);
        let record = h.history.get("RegularUser").await.unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.objects, vec!["t1_same"]);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_events_all_counted() {
        let h = Arc::new(harness(&["Mod1"], NotificationSettings::default()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let h = Arc::clone(&h);
            handles.push(tokio::spawn(async move {
                h.service
                    .handle_content(comment(&format!("t1_{i}"), "RegularUser", "u/Mod1"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(count_for(&h.history, "RegularUser").await, 10);
    }

    #[tokio::test]
    async fn test_mod_action_filter() {
        let h = harness(&["Mod1"], NotificationSettings::default());

        assert!(!h.service.handle_mod_action("banuser").await.unwrap());
        assert!(h.directory.get("test").await.unwrap().is_none());

        assert!(h.service.handle_mod_action("addmoderator").await.unwrap());
        assert!(h.directory.get("test").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_app_changed_repopulates() {
        let h = harness(&["Mod1", "Mod2"], NotificationSettings::default());

        let directory = h.service.handle_app_changed().await.unwrap();
        assert_eq!(directory.moderators(), ["Mod1", "Mod2", "test-ModTeam"]);
    }

    #[tokio::test]
    async fn test_author_locks_released_on_every_path() {
        let h = harness(&["Mod1"], NotificationSettings::default());

        h.service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap();
        h.service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap();
        h.service
            .handle_content(comment("t1_b", "Mod1", "u/Mod1 hi"))
            .await
            .unwrap();
        h.service
            .handle_content(comment("t1_c", "Quiet", "nothing here"))
            .await
            .unwrap();
        assert_eq!(h.service.author_locks.len(), 0);

        let empty = harness(&[], NotificationSettings::default());
        empty
            .service
            .handle_content(comment("t1_a", "RegularUser", "u/Mod1"))
            .await
            .unwrap_err();
        assert_eq!(empty.service.author_locks.len(), 0);
    }
}
