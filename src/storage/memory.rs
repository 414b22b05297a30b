use std::sync::{Mutex, MutexGuard};

use super::types::{NewEpisode, StoreError, StoredEpisode};
use super::EpisodeStore;

/// In-process episode collection.
///
/// Behaves like [`SqliteStore`](super::SqliteStore): link uniqueness is
/// enforced and a batch containing a known link writes nothing. It also counts
/// `insert_many` calls so callers can check that no write happened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    episodes: Vec<StoredEpisode>,
    last_id: i64,
    insert_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored episode in insertion order.
    pub fn episodes(&self) -> Vec<StoredEpisode> {
        self.lock().map(|inner| inner.episodes.clone()).unwrap_or_default()
    }

    /// Number of `insert_many` calls received, including empty ones.
    pub fn insert_calls(&self) -> usize {
        self.lock().map(|inner| inner.insert_calls).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl EpisodeStore for MemoryStore {
    async fn find_by_link(&self, link: &str) -> Result<Option<StoredEpisode>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.episodes.iter().find(|e| e.link == link).cloned())
    }

    async fn insert_many(
        &self,
        episodes: Vec<NewEpisode>,
    ) -> Result<Vec<StoredEpisode>, StoreError> {
        let mut inner = self.lock()?;
        inner.insert_calls += 1;

        for (i, episode) in episodes.iter().enumerate() {
            let stored_before = inner.episodes.iter().any(|e| e.link == episode.link);
            let repeated_in_batch = episodes[..i].iter().any(|e| e.link == episode.link);
            if stored_before || repeated_in_batch {
                return Err(StoreError::DuplicateLink(episode.link.clone()));
            }
        }

        let mut stored = Vec::with_capacity(episodes.len());
        for episode in episodes {
            inner.last_id += 1;
            let episode = episode.into_stored(inner.last_id);
            inner.episodes.push(episode.clone());
            stored.push(episode);
        }
        Ok(stored)
    }
}
