//! Derived per-episode metadata.
//!
//! Pure transform: no I/O, order and cardinality preserved.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::feed::RawEpisode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrichError {
    /// The feed item at `index` (feed order, zero-based) lacks a required field.
    #[error("Episode {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// A feed item with every required field present plus derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedEpisode {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: Option<String>,
    /// Unicode scalar values in `title`
    pub title_length: usize,
    /// Unicode scalar values in `description`
    pub description_length: usize,
    pub link_hash: String,
}

/// Adds `title_length`, `description_length` and `link_hash` to each episode.
///
/// Fails on the first episode missing `title`, `description` or `link`; an
/// empty `link` counts as missing. Nothing is returned for a failing batch.
pub fn enrich(episodes: Vec<RawEpisode>) -> Result<Vec<EnrichedEpisode>, EnrichError> {
    episodes
        .into_iter()
        .enumerate()
        .map(|(index, raw)| enrich_one(index, raw))
        .collect()
}

fn enrich_one(index: usize, raw: RawEpisode) -> Result<EnrichedEpisode, EnrichError> {
    let missing = |field| EnrichError::MissingField { index, field };

    let title = raw.title.ok_or_else(|| missing("title"))?;
    let description = raw.description.ok_or_else(|| missing("description"))?;
    let link = raw
        .link
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| missing("link"))?;

    Ok(EnrichedEpisode {
        title_length: title.chars().count(),
        description_length: description.chars().count(),
        link_hash: link_hash(&link),
        title,
        description,
        link,
        pub_date: raw.pub_date,
    })
}

/// Lowercase hex SHA-256 of the link. Stable across runs and machines.
pub fn link_hash(link: &str) -> String {
    format!("{:x}", Sha256::digest(link.as_bytes()))
}
