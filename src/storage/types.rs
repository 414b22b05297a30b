use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store errors. All of them abort the run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file is locked by another writer
    #[error("Episode store is locked by another process")]
    Locked,

    /// Connection string could not be used to reach the store
    #[error("Failed to connect to episode store: {0}")]
    Connect(String),

    /// Collection names are spliced into SQL and must be plain identifiers
    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),

    /// Migration failed
    #[error("Episode store migration failed: {0}")]
    Migration(String),

    /// The store already holds a document with this link
    #[error("Episode with link '{0}' already stored")]
    DuplicateLink(String),

    /// A stored row holds a value no episode can have (e.g. a negative length)
    #[error("Corrupt episode row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    /// In-process store is unusable (poisoned lock)
    #[error("Episode store unavailable: {0}")]
    Unavailable(String),

    /// Generic database error
    #[error("Episode store error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, picking out lock contention.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StoreError::Locked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// An episode document ready to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
    pub link: String,
    pub title: String,
    pub published: Option<String>,
    pub description: String,
    pub filename: String,
    /// Filled in later by the transcription job; always `None` on insert.
    pub transcript: Option<String>,
    pub title_length: usize,
    pub description_length: usize,
    pub link_hash: String,
}

impl NewEpisode {
    pub(crate) fn into_stored(self, id: i64) -> StoredEpisode {
        StoredEpisode {
            id,
            link: self.link,
            title: self.title,
            published: self.published,
            description: self.description,
            filename: self.filename,
            transcript: self.transcript,
            title_length: self.title_length,
            description_length: self.description_length,
            link_hash: self.link_hash,
        }
    }
}

/// An episode document as persisted, with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEpisode {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub published: Option<String>,
    pub description: String,
    pub filename: String,
    pub transcript: Option<String>,
    pub title_length: usize,
    pub description_length: usize,
    pub link_hash: String,
}

/// Internal row type for episode queries (used by sqlx FromRow).
/// SQLite integers come back as i64; converted via into_episode().
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EpisodeDbRow {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub published: Option<String>,
    pub description: String,
    pub filename: String,
    pub transcript: Option<String>,
    pub title_length: i64,
    pub description_length: i64,
    pub link_hash: String,
}

impl EpisodeDbRow {
    pub(crate) fn into_episode(self) -> Result<StoredEpisode, StoreError> {
        let title_length = column_length(self.id, "title_length", self.title_length)?;
        let description_length =
            column_length(self.id, "description_length", self.description_length)?;

        Ok(StoredEpisode {
            id: self.id,
            link: self.link,
            title: self.title,
            published: self.published,
            description: self.description,
            filename: self.filename,
            transcript: self.transcript,
            title_length,
            description_length,
            link_hash: self.link_hash,
        })
    }
}

fn column_length(id: i64, column: &str, value: i64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::Corrupt {
        id,
        reason: format!("{column} is {value}"),
    })
}
