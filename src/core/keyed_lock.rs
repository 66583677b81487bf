// Keyed async mutual exclusion.
//
// Used for per-author history updates and per-community directory refreshes:
// two tasks holding the same key run one after the other, different keys never
// wait on each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes addressed by a string key.
///
/// Keys are compared case-insensitively since Reddit usernames and
/// subreddit names are.
#[derive(Default)]
pub struct KeyedLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Guard returned by [`KeyedLock::lock`]. The key stays locked until it is dropped.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait until `key` is free and take it.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let mutex = {
            // Clone the Arc out so the shard lock is released before awaiting.
            let entry = self
                .locks
                .entry(key.to_lowercase())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };

        KeyedGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Drop mutexes nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
