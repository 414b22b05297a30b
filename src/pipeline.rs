//! The run-once entry point: fetch, enrich, reconcile.
//!
//! Scheduling and retries belong to whoever calls [`run`] or [`run_once`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::enrich::{enrich, EnrichError};
use crate::feed::{fetch_feed, parse_episodes, FetchError, ParseError};
use crate::reconcile::reconcile;
use crate::storage::{EpisodeStore, SqliteStore, StoreError, StoredEpisode};

/// Why a run stopped. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),

    #[error("Failed to enrich episodes: {0}")]
    Enrich(#[from] EnrichError),

    #[error("Episode store failure: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub feed_url: String,
    /// Items found in the feed
    pub fetched: usize,
    /// Episodes written by this run, with their ids
    pub inserted: Vec<StoredEpisode>,
}

impl RunReport {
    /// Feed items that were not inserted (already stored or repeated in the feed).
    pub fn skipped(&self) -> usize {
        self.fetched.saturating_sub(self.inserted.len())
    }
}

/// Runs the pipeline once against the SQLite store named by `config`.
///
/// Builds a default HTTP client, opens the store and delegates to
/// [`run_once`]. The store connection is closed before returning.
pub async fn run(config: &Config) -> Result<RunReport, PipelineError> {
    config.validate()?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("podcast-ingest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(FetchError::Network)?;
    let store = SqliteStore::open(&config.store.resolve_url(), &config.store.collection).await?;

    let result = run_once(config, &client, &store).await;
    store.close().await;
    result
}

/// Runs fetch, enrich and reconcile once, in that order.
///
/// Nothing is written unless every stage before the reconciler succeeded.
pub async fn run_once<S: EpisodeStore>(
    config: &Config,
    client: &reqwest::Client,
    store: &S,
) -> Result<RunReport, PipelineError> {
    let started_at = Utc::now();
    tracing::info!(feed = %config.feed_url, "Starting ingest run");

    let body = fetch_feed(client, &config.feed_url).await?;
    let raw = parse_episodes(&body)?;
    let fetched = raw.len();
    tracing::info!(episodes = fetched, "Found episodes in feed");

    let enriched = enrich(raw)?;
    let inserted = reconcile(store, enriched).await?;

    let report = RunReport {
        started_at,
        feed_url: config.feed_url.clone(),
        fetched,
        inserted,
    };
    tracing::info!(
        fetched = report.fetched,
        inserted = report.inserted.len(),
        skipped = report.skipped(),
        "Ingest run complete"
    );
    Ok(report)
}
