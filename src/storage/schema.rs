use secrecy::{ExposeSecret, SecretString};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;
use crate::config::is_identifier;

// ============================================================================
// SqliteStore
// ============================================================================

/// SQLite-backed episode collection. One table per collection.
#[derive(Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
    pub(crate) table: String,
}

impl SqliteStore {
    /// Connect to `url` and make sure the collection table exists.
    ///
    /// `url` is any sqlx SQLite connection string, e.g.
    /// `sqlite:podcasts.db?mode=rwc` or `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidCollection` if `collection` is not an identifier
    /// - `StoreError::Connect` if the URL is not a usable `sqlite:` URL
    /// - `StoreError::Locked` if another writer holds the database
    /// - `StoreError::Migration` for other schema failures
    pub async fn open(url: &SecretString, collection: &str) -> Result<Self, StoreError> {
        if !is_identifier(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }

        if !url.expose_secret().starts_with("sqlite:") {
            return Err(StoreError::Connect(
                "unsupported connection string (expected a sqlite: URL)".to_string(),
            ));
        }

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks before SQLITE_BUSY.
        // Using pragma() ensures all connections in the pool inherit this setting.
        let options = SqliteConnectOptions::from_str(url.expose_secret())
            .map_err(|e| StoreError::Connect(e.to_string()))?
            .pragma("busy_timeout", "5000");
        // Queries within a run are strictly sequential.
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let store = Self {
            pool,
            table: collection.to_string(),
        };
        store.migrate().await.map_err(|e| match StoreError::from_sqlx(e) {
            StoreError::Locked => StoreError::Locked,
            other => StoreError::Migration(other.to_string()),
        })?;

        tracing::debug!(collection = %store.table, "Episode store ready");
        Ok(store)
    }

    /// Collection (table) this store reads and writes.
    pub fn collection(&self) -> &str {
        &self.table
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create the collection table and its indexes.
    ///
    /// Wrapped in one transaction; every statement uses `IF NOT EXISTS`, so
    /// re-running on an existing database is a no-op.
    pub(crate) async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // The UNIQUE constraint on link backs up the reconciler's existence
        // check when two runs overlap.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id INTEGER PRIMARY KEY,
                link TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL,
                published TEXT,
                description TEXT NOT NULL,
                filename TEXT NOT NULL,
                transcript TEXT,
                title_length INTEGER NOT NULL,
                description_length INTEGER NOT NULL,
                link_hash TEXT NOT NULL
            )
        "#,
            table = self.table
        ))
        .execute(&mut *tx)
        .await?;

        // Lets the transcription job find pending episodes cheaply
        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS "idx_{table}_pending" ON "{table}"(id) WHERE transcript IS NULL"#,
            table = self.table
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
