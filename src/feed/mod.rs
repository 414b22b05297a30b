//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - one HTTP GET with a body size cap, no retries
//! - [`parser`] - streaming `quick-xml` walk of `rss > channel > item`
//!
//! Both halves are fatal on failure; the pipeline keeps them separate so a
//! transport problem and a malformed document surface as different errors.

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, FetchError};
pub use parser::{parse_episodes, ParseError, RawEpisode};
