// Mention history - per-author record of processed content and mention count.
//
// The store only has to provide plain get/put. Read-modify-write atomicity per
// author is the service's job (it holds a keyed lock around the cycle).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// What we know about one author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionHistoryRecord {
    pub count: u64,
    /// Content IDs that were already processed for this author
    pub objects: Vec<String>,
}

impl MentionHistoryRecord {
    pub fn contains(&self, content_id: &str) -> bool {
        self.objects.iter().any(|o| o == content_id)
    }

    /// Track a new mention. Returns `false` (and changes nothing) if the
    /// content was already tracked.
    pub fn record(&mut self, content_id: &str) -> bool {
        if self.contains(content_id) {
            return false;
        }
        self.objects.push(content_id.to_string());
        self.count += 1;
        true
    }
}

/// Persistence port for mention history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The author's record, or an empty one if we've never seen them.
    async fn get(&self, author: &str) -> Result<MentionHistoryRecord, HistoryError>;

    /// Replace the author's record.
    async fn put(&self, author: &str, record: &MentionHistoryRecord) -> Result<(), HistoryError>;

    /// Every tracked author with their count, in no particular order.
    async fn counts(&self) -> Result<Vec<(String, u64)>, HistoryError>;

    /// Authors sorted by count, highest first. Ties fall back to name so
    /// the order is stable between calls.
    async fn ranked_by_count(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        let mut counts = self.counts().await?;
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}

// Lets one store instance back several services.
#[async_trait]
impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    async fn get(&self, author: &str) -> Result<MentionHistoryRecord, HistoryError> {
        (**self).get(author).await
    }

    async fn put(&self, author: &str, record: &MentionHistoryRecord) -> Result<(), HistoryError> {
        (**self).put(author, record).await
    }

    async fn counts(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        (**self).counts().await
    }

    async fn ranked_by_count(&self) -> Result<Vec<(String, u64)>, HistoryError> {
        (**self).ranked_by_count().await
    }
}
