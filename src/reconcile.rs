//! Merges enriched episodes into the store without duplicating links.

use std::collections::HashSet;

use url::Url;

use crate::enrich::EnrichedEpisode;
use crate::storage::{EpisodeStore, NewEpisode, StoreError, StoredEpisode};

/// Extension appended to the stem of every episode filename.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Inserts the episodes whose link is not yet stored.
///
/// Every episode gets its own `find_by_link` lookup. A link appearing twice in
/// `episodes` is considered once, first occurrence wins. The missing episodes
/// are written with a single `insert_many`; when nothing is missing, the store
/// is not written to at all.
///
/// Returns the inserted episodes with their ids, in feed order.
///
/// # Errors
///
/// Any [`StoreError`] from a lookup or the insert aborts reconciliation.
pub async fn reconcile<S: EpisodeStore>(
    store: &S,
    episodes: Vec<EnrichedEpisode>,
) -> Result<Vec<StoredEpisode>, StoreError> {
    let total = episodes.len();
    let mut seen = HashSet::with_capacity(total);
    let mut missing = Vec::new();

    for episode in episodes {
        if !seen.insert(episode.link.clone()) {
            tracing::debug!(link = %episode.link, "Link repeated within feed, skipping");
            continue;
        }

        if store.find_by_link(&episode.link).await?.is_some() {
            tracing::trace!(link = %episode.link, "Episode already stored");
            continue;
        }

        missing.push(new_document(episode));
    }

    if missing.is_empty() {
        tracing::info!(episodes = total, "No new episodes");
        return Ok(Vec::new());
    }

    let inserted = store.insert_many(missing).await?;
    tracing::info!(
        episodes = total,
        inserted = inserted.len(),
        "Stored new episodes"
    );
    Ok(inserted)
}

fn new_document(episode: EnrichedEpisode) -> NewEpisode {
    NewEpisode {
        filename: filename_for_link(&episode.link, &episode.link_hash),
        link: episode.link,
        title: episode.title,
        published: episode.pub_date,
        description: episode.description,
        transcript: None,
        title_length: episode.title_length,
        description_length: episode.description_length,
        link_hash: episode.link_hash,
    }
}

/// Audio filename for an episode: the link's last non-empty path segment plus
/// [`AUDIO_EXTENSION`].
///
/// Query and fragment are ignored. Links that are not absolute URLs fall back
/// to the text after the last `/`. When no segment is left (`https://host/`),
/// `link_hash` is used as the stem.
pub fn filename_for_link(link: &str, link_hash: &str) -> String {
    let stem = match Url::parse(link) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };

    format!(
        "{}.{AUDIO_EXTENSION}",
        stem.unwrap_or_else(|| link_hash.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::link_hash;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn enriched(link: &str) -> EnrichedEpisode {
        EnrichedEpisode {
            title: "Ep 1".to_string(),
            description: "desc text".to_string(),
            link: link.to_string(),
            pub_date: Some("Mon, 12 Aug 2024 22:00:00 +0000".to_string()),
            title_length: 4,
            description_length: 9,
            link_hash: link_hash(link),
        }
    }

    /// Store whose every call fails, standing in for an unreachable backend.
    struct UnreachableStore;

    impl EpisodeStore for UnreachableStore {
        async fn find_by_link(&self, _link: &str) -> Result<Option<StoredEpisode>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn insert_many(
            &self,
            _episodes: Vec<NewEpisode>,
        ) -> Result<Vec<StoredEpisode>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_filename_from_last_path_segment() {
        let link = "https://example.com/feed/ep-42";
        assert_eq!(filename_for_link(link, &link_hash(link)), "ep-42.mp3");
    }

    #[test]
    fn test_filename_ignores_trailing_slash_and_query() {
        assert_eq!(
            filename_for_link("https://example.com/shows/ep-7/?utm=rss", "h"),
            "ep-7.mp3"
        );
    }

    #[test]
    fn test_filename_falls_back_to_hash_without_path() {
        assert_eq!(filename_for_link("https://example.com/", "abc123"), "abc123.mp3");
    }

    #[test]
    fn test_filename_for_non_url_link() {
        assert_eq!(filename_for_link("episodes/ep-9", "h"), "ep-9.mp3");
    }

    #[tokio::test]
    async fn test_inserts_only_unknown_links() {
        let store = MemoryStore::new();
        let existing = reconcile(&store, vec![enriched("https://x/a")]).await.unwrap();
        assert_eq!(existing.len(), 1);

        let inserted = reconcile(&store, vec![enriched("https://x/a"), enriched("https://x/b")])
            .await
            .unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].link, "https://x/b");
        assert!(inserted[0].id > existing[0].id);

        // The earlier document is untouched
        let stored = store.episodes();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], existing[0]);
    }

    #[tokio::test]
    async fn test_builds_document_fields() {
        let store = MemoryStore::new();
        let link = "https://example.com/feed/ep-42";
        let inserted = reconcile(&store, vec![enriched(link)]).await.unwrap();

        let doc = &inserted[0];
        assert_eq!(doc.link, link);
        assert_eq!(doc.title, "Ep 1");
        assert_eq!(doc.description, "desc text");
        assert_eq!(doc.published.as_deref(), Some("Mon, 12 Aug 2024 22:00:00 +0000"));
        assert_eq!(doc.filename, "ep-42.mp3");
        assert_eq!(doc.transcript, None);
        assert_eq!(doc.title_length, 4);
        assert_eq!(doc.description_length, 9);
        assert_eq!(doc.link_hash, link_hash(link));
    }

    #[tokio::test]
    async fn test_nothing_new_means_no_write() {
        let store = MemoryStore::new();
        reconcile(&store, vec![enriched("https://x/a")]).await.unwrap();
        assert_eq!(store.insert_calls(), 1);

        let inserted = reconcile(&store, vec![enriched("https://x/a")]).await.unwrap();
        assert!(inserted.is_empty());
        assert_eq!(store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_means_no_write() {
        let store = MemoryStore::new();
        assert!(reconcile(&store, Vec::new()).await.unwrap().is_empty());
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_link_in_batch_inserted_once() {
        let store = MemoryStore::new();
        let mut second = enriched("https://x/a");
        second.title = "Ep 1 (repost)".to_string();

        let inserted = reconcile(&store, vec![enriched("https://x/a"), second])
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].title, "Ep 1");
    }

    #[tokio::test]
    async fn test_preserves_feed_order() {
        let store = MemoryStore::new();
        let links = ["https://x/c", "https://x/a", "https://x/b"];
        let inserted = reconcile(&store, links.iter().map(|l| enriched(l)).collect())
            .await
            .unwrap();
        let got: Vec<&str> = inserted.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(got, links);
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let result = reconcile(&UnreachableStore, vec![enriched("https://x/a")]).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
