//! Podcast feed ingestion.
//!
//! One run fetches an RSS feed, derives per-episode metadata and stores the
//! episodes whose link has not been seen before:
//!
//! - [`feed`] - HTTP retrieval and RSS item parsing
//! - [`enrich`] - title/description lengths and a stable link hash
//! - [`reconcile`] - existence checks and the batch insert
//! - [`storage`] - the [`storage::EpisodeStore`] trait and its backends
//! - [`pipeline`] - [`pipeline::run_once`], the entry point a scheduler calls
//!
//! # Example
//!
//! ```ignore
//! use podcast_ingest::{config::Config, pipeline};
//!
//! let config = Config::load(path)?;
//! let report = pipeline::run(&config).await?;
//! println!("{} new episodes", report.inserted.len());
//! ```

pub mod config;
pub mod enrich;
pub mod feed;
pub mod pipeline;
pub mod reconcile;
pub mod storage;

pub use config::Config;
pub use pipeline::{run, run_once, PipelineError, RunReport};
