// Moderator directory cache - read-through cache over an external modlist.
//
// Lifecycle per community: absent -> populated -> invalidated -> repopulated.
// The cached value is only ever replaced whole. A failed or empty fetch leaves
// whatever was cached before untouched.

use super::directory_models::{DirectoryError, ModeratorDirectory};
use crate::core::keyed_lock::KeyedLock;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// PORTS
// ============================================================================

/// The external moderator directory (Reddit's modlist).
///
/// Implementations flatten any paging themselves and hand back the full
/// list in modlist order.
#[async_trait]
pub trait ModeratorSource: Send + Sync {
    async fn fetch_moderators(&self, community: &str) -> Result<Vec<String>, DirectoryError>;
}

/// Where the cached modlist lives between events.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn load_moderators(&self, community: &str)
        -> Result<Option<Vec<String>>, DirectoryError>;

    /// Replace the whole cached list for a community.
    async fn store_moderators(
        &self,
        community: &str,
        moderators: &[String],
    ) -> Result<(), DirectoryError>;

    async fn clear_moderators(&self, community: &str) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<T: ModeratorSource + ?Sized> ModeratorSource for Arc<T> {
    async fn fetch_moderators(&self, community: &str) -> Result<Vec<String>, DirectoryError> {
        (**self).fetch_moderators(community).await
    }
}

#[async_trait]
impl<T: DirectoryStore + ?Sized> DirectoryStore for Arc<T> {
    async fn load_moderators(&self, community: &str)
        -> Result<Option<Vec<String>>, DirectoryError> {
        (**self).load_moderators(community).await
    }

    async fn store_moderators(
        &self,
        community: &str,
        moderators: &[String],
    ) -> Result<(), DirectoryError> {
        (**self).store_moderators(community, moderators).await
    }

    async fn clear_moderators(&self, community: &str) -> Result<(), DirectoryError> {
        (**self).clear_moderators(community).await
    }
}

// ============================================================================
// CACHE
// ============================================================================

pub struct ModeratorDirectoryCache<S: DirectoryStore, F: ModeratorSource> {
    store: S,
    source: F,
    refresh_locks: KeyedLock,
    /// Monotonic ticket handed to every refresh when it starts fetching.
    tickets: AtomicU64,
    /// Ticket of the last refresh that completed, per community.
    completed: DashMap<String, u64>,
}

impl<S: DirectoryStore, F: ModeratorSource> ModeratorDirectoryCache<S, F> {
    pub fn new(store: S, source: F) -> Self {
        Self {
            store,
            source,
            refresh_locks: KeyedLock::new(),
            tickets: AtomicU64::new(0),
            completed: DashMap::new(),
        }
    }

    /// Current cached directory, if any. Never triggers a fetch.
    pub async fn get(&self, community: &str) -> Result<Option<ModeratorDirectory>, DirectoryError> {
        let cached = self.store.load_moderators(community).await?;
        Ok(cached
            .filter(|moderators| !moderators.is_empty())
            .map(|moderators| ModeratorDirectory::new(community, moderators)))
    }

    /// Fetch the full modlist, append the team account and replace the cache.
    ///
    /// Concurrent refreshes for the same community collapse: a caller that had
    /// to wait behind a refresh which started after it asked reuses that result
    /// instead of fetching again.
    pub async fn refresh(&self, community: &str) -> Result<ModeratorDirectory, DirectoryError> {
        let requested_at = self.tickets.load(Ordering::SeqCst);
        let _guard = self.refresh_locks.lock(community).await;

        if self.completed_ticket(community) > requested_at {
            if let Some(directory) = self.get(community).await? {
                tracing::debug!(community, "Reusing modlist refreshed while waiting");
                return Ok(directory);
            }
        }

        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        let fetched = self.source.fetch_moderators(community).await?;
        if fetched.is_empty() {
            tracing::warn!(community, "Fetched modlist is empty, keeping cached value");
            return Err(DirectoryError::DirectoryEmpty(community.to_string()));
        }

        let directory = ModeratorDirectory::from_fetched(community, fetched);
        self.store
            .store_moderators(community, directory.moderators())
            .await?;
        self.completed.insert(community.to_lowercase(), ticket);

        tracing::info!(
            community = directory.community(),
            moderators = directory.moderators().len(),
            "Cached modlist refreshed"
        );
        Ok(directory)
    }

    /// Invalidate without fetching. `get` returns `None` until the next refresh.
    pub async fn clear(&self, community: &str) -> Result<(), DirectoryError> {
        self.store.clear_moderators(community).await?;
        tracing::info!(community, "Cleared cached modlist");
        Ok(())
    }

    /// Clear and immediately repopulate. Used on app install/upgrade and
    /// on modlist-changing moderation actions.
    pub async fn invalidate(&self, community: &str) -> Result<ModeratorDirectory, DirectoryError> {
        self.clear(community).await?;
        self.refresh(community).await
    }

    fn completed_ticket(&self, community: &str) -> u64 {
        self.completed
            .get(&community.to_lowercase())
            .map(|t| *t)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

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

    /// Serves whatever list is currently set, counting calls.
    #[derive(Clone)]
    struct MockSource {
        next: Arc<Mutex<Result<Vec<String>, String>>>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl Default for MockSource {
        fn default() -> Self {
            Self {
                next: Arc::new(Mutex::new(Ok(Vec::new()))),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: None,
            }
        }
    }

    impl MockSource {
        fn serving(moderators: &[&str]) -> Self {
            let source = Self::default();
            source.set(moderators);
            source
        }

        fn set(&self, moderators: &[&str]) {
            *self.next.lock().unwrap() = Ok(moderators.iter().map(|m| m.to_string()).collect());
        }

        fn fail(&self, reason: &str) {
            *self.next.lock().unwrap() = Err(reason.to_string());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModeratorSource for MockSource {
        async fn fetch_moderators(&self, community: &str) -> Result<Vec<String>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next
                .lock()
                .unwrap()
                .clone()
                .map_err(|reason| DirectoryError::DirectoryFetchFailed {
                    community: community.to_string(),
                    reason,
                })
        }
    }

    #[tokio::test]
    async fn test_cold_cache_is_absent() {
        let cache = ModeratorDirectoryCache::new(MockDirectoryStore::default(), MockSource::default());
        assert!(cache.get("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_populates_with_team_account() {
        let source = MockSource::serving(&["Mod1", "Mod2"]);
        let cache = ModeratorDirectoryCache::new(MockDirectoryStore::default(), source);

        let directory = cache.refresh("rust").await.unwrap();
        assert_eq!(directory.moderators(), ["Mod1", "Mod2", "rust-ModTeam"]);

        let cached = cache.get("rust").await.unwrap().unwrap();
        assert_eq!(cached, directory);
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_previous_value() {
        let source = MockSource::serving(&["Mod1"]);
        let cache = ModeratorDirectoryCache::new(MockDirectoryStore::default(), source.clone());
        cache.refresh("rust").await.unwrap();

        source.set(&[]);
        let err = cache.refresh("rust").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DirectoryEmpty(_)));

        let cached = cache.get("rust").await.unwrap().unwrap();
        assert_eq!(cached.moderators(), ["Mod1", "rust-ModTeam"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_surfaced() {
        let source = MockSource::default();
        source.fail("connection reset");
        let cache = ModeratorDirectoryCache::new(MockDirectoryStore::default(), source);

        let err = cache.refresh("rust").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DirectoryFetchFailed { .. }));
        assert!(cache.get("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_then_get_is_absent() {
        let cache = ModeratorDirectoryCache::new(
            MockDirectoryStore::default(),
            MockSource::serving(&["Mod1"]),
        );
        cache.refresh("rust").await.unwrap();
        cache.clear("rust").await.unwrap();
        assert!(cache.get("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_new_modlist() {
        let source = MockSource::serving(&["Mod1"]);
        let cache = ModeratorDirectoryCache::new(MockDirectoryStore::default(), source.clone());
        cache.refresh("rust").await.unwrap();

        source.set(&["Mod1", "NewMod"]);
        let directory = cache.invalidate("rust").await.unwrap();
        assert!(directory.contains("NewMod"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_collapse() {
        let source = MockSource {
            delay: Some(Duration::from_millis(50)),
            ..MockSource::serving(&["Mod1"])
        };
        let cache = Arc::new(ModeratorDirectoryCache::new(
            MockDirectoryStore::default(),
            source.clone(),
        ));

        // One refresh in flight, then a burst arriving while it fetches
        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.refresh("rust").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut waiters = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            waiters.push(tokio::spawn(async move { cache.refresh("rust").await }));
        }

        first.await.unwrap().unwrap();
        for waiter in waiters {
            let directory = waiter.await.unwrap().unwrap();
            assert_eq!(directory.moderators(), ["Mod1", "rust-ModTeam"]);
        }

        // The in-flight fetch started before the burst asked, so one more
        // fetch is needed for them, shared by all five.
        assert_eq!(source.calls(), 2);
    }
}
