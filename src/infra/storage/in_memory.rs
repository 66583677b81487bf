// In-memory implementation of DirectoryStore and HistoryStore.
//
// Nothing survives a restart. Used with STORAGE=memory and for local runs
// where the modlist gets refetched on startup anyway.

use crate::core::mentions::{HistoryError, HistoryStore, MentionHistoryRecord};
use crate::core::moderators::{DirectoryError, DirectoryStore};
use async_trait::async_trait;
use dashmap::DashMap;

/// DashMap-backed store. Safe to share across tasks without a Mutex.
pub struct InMemoryStore {
    /// community -> cached modlist
    moderators: DashMap<String, Vec<String>>,
    /// author -> mention history
    history: DashMap<String, MentionHistoryRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            moderators: DashMap::new(),
            history: DashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn load_moderators(
        &self,
        community: &str,
    ) -> Result<Option<Vec<String>>, DirectoryError> {
        Ok(self
            .moderators
            .get(&community.to_lowercase())
            .map(|entry| entry.clone()))
    }

    async fn store_moderators(
        &self,
        community: &str,
        moderators: &[String],
    ) -> Result<(), DirectoryError> {
        self.moderators
            .insert(community.to_lowercase(), moderators.to_vec());
        Ok(())
    }

    async fn clear_moderators(&self, community: &str) -> Result<(), DirectoryError> {
        self.moderators.remove(&community.to_lowercase());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn get(&self, author: &str) -> Result<MentionHistoryRecord, HistoryError> {
        Ok(self
            .history
            .get(author)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn put(&self, author: &str, record: &MentionHistoryRecord) -> Result<(), HistoryError> {
        self.history.insert(author.to_string(), record.clone());
        Ok(())
    }

    async fn counts(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        Ok(self
            .history
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count))
            .collect())
    }
}
