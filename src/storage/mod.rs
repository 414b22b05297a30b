//! Episode persistence.
//!
//! The reconciler only needs two capabilities, captured by [`EpisodeStore`]:
//! a point lookup by link and a batch insert. [`SqliteStore`] is the
//! production backend; [`MemoryStore`] is an in-process double.

use std::future::Future;

mod episodes;
mod memory;
mod schema;
mod types;

pub use memory::MemoryStore;
pub use schema::SqliteStore;
pub use types::{NewEpisode, StoreError, StoredEpisode};

/// A collection of episode documents keyed by `link`.
pub trait EpisodeStore {
    /// Returns the stored episode with this exact link, if any.
    fn find_by_link(
        &self,
        link: &str,
    ) -> impl Future<Output = Result<Option<StoredEpisode>, StoreError>> + Send;

    /// Inserts every episode and returns them with their assigned ids, in
    /// input order. The reconciler never calls this with an empty batch.
    fn insert_many(
        &self,
        episodes: Vec<NewEpisode>,
    ) -> impl Future<Output = Result<Vec<StoredEpisode>, StoreError>> + Send;
}
