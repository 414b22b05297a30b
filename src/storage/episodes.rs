use super::schema::SqliteStore;
use super::types::{EpisodeDbRow, NewEpisode, StoreError, StoredEpisode};
use super::EpisodeStore;

const EPISODE_COLUMNS: &str = "id, link, title, published, description, filename, transcript, \
     title_length, description_length, link_hash";

impl EpisodeStore for SqliteStore {
    async fn find_by_link(&self, link: &str) -> Result<Option<StoredEpisode>, StoreError> {
        let row = sqlx::query_as::<_, EpisodeDbRow>(&format!(
            r#"SELECT {EPISODE_COLUMNS} FROM "{}" WHERE link = ?"#,
            self.table
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        row.map(EpisodeDbRow::into_episode).transpose()
    }

    /// Inserts the whole batch in one transaction; a failure writes nothing.
    async fn insert_many(
        &self,
        episodes: Vec<NewEpisode>,
    ) -> Result<Vec<StoredEpisode>, StoreError> {
        if episodes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            INSERT INTO "{}" (link, title, published, description, filename, transcript,
                              title_length, description_length, link_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
            self.table
        );

        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let mut stored = Vec::with_capacity(episodes.len());

        for episode in episodes {
            let result = sqlx::query(&sql)
                .bind(&episode.link)
                .bind(&episode.title)
                .bind(&episode.published)
                .bind(&episode.description)
                .bind(&episode.filename)
                .bind(&episode.transcript)
                .bind(episode.title_length as i64)
                .bind(episode.description_length as i64)
                .bind(&episode.link_hash)
                .execute(&mut *tx)
                .await;

            let id = match result {
                Ok(done) => done.last_insert_rowid(),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    return Err(StoreError::DuplicateLink(episode.link));
                }
                Err(e) => return Err(StoreError::from_sqlx(e)),
            };
            stored.push(episode.into_stored(id));
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(stored)
    }
}

impl SqliteStore {
    /// Number of documents in the collection.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(count)
    }

    /// Every document in the collection, oldest insert first.
    pub async fn list(&self) -> Result<Vec<StoredEpisode>, StoreError> {
        let rows = sqlx::query_as::<_, EpisodeDbRow>(&format!(
            r#"SELECT {EPISODE_COLUMNS} FROM "{}" ORDER BY id"#,
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(EpisodeDbRow::into_episode).collect()
    }
}
