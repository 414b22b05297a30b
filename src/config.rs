//! Configuration file parser for ~/.config/podcast-ingest/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys do not fail the load; each one is logged as a warning so
//! typos like `feed_ur` are visible.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Env var that overrides `store.url` from the config file.
pub const STORE_URL_ENV: &str = "PODCAST_INGEST_STORE_URL";

/// Feed ingested when the config file does not name one.
pub const DEFAULT_FEED_URL: &str = "https://www.marketplace.org/feed/podcast/marketplace/";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed_url '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    /// Namespace names end up in SQL, so only plain identifiers are allowed.
    #[error("Invalid store.{field} '{value}': expected letters, digits and underscores")]
    InvalidName { field: &'static str, value: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level job configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RSS feed to ingest.
    pub feed_url: String,

    /// Where new episodes are persisted.
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            store: StoreConfig::default(),
        }
    }
}

/// Store location and namespace.
///
/// SEC-015: Custom Debug impl masks `url`, which may carry credentials.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string. `PODCAST_INGEST_STORE_URL` takes precedence.
    pub url: Option<String>,

    /// Database name; names the SQLite file when no url is configured.
    pub database: String,

    /// Collection holding the episode documents.
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "podcasts".to_string(),
            collection: "episodes".to_string(),
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

impl StoreConfig {
    /// Resolve the connection string: env var, then config file, then a
    /// SQLite file named after `database`.
    pub fn resolve_url(&self) -> SecretString {
        resolve_store_url(std::env::var(STORE_URL_ENV).ok(), self)
    }
}

fn resolve_store_url(env_url: Option<String>, store: &StoreConfig) -> SecretString {
    let url = env_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| store.url.clone())
        .unwrap_or_else(|| format!("sqlite:{}.db?mode=rwc", store.database));
    SecretString::from(url)
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, each logged as a warning
    ///
    /// The loaded values are checked with [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            feed = %config.feed_url,
            collection = %config.store.collection,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check the feed URL and store names before anything touches the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.feed_url).map_err(|e| ConfigError::InvalidFeedUrl {
            url: self.feed_url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConfigError::InvalidFeedUrl {
                    url: self.feed_url.clone(),
                    reason: format!("unsupported scheme {scheme} (only http/https allowed)"),
                })
            }
        }

        for (field, value) in [
            ("database", &self.store.database),
            ("collection", &self.store.collection),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidName {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    const KNOWN_KEYS: [&str; 2] = ["feed_url", "store"];
    const KNOWN_STORE_KEYS: [&str; 3] = ["url", "database", "collection"];

    for (key, value) in raw {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        }
        let Some(store) = value.as_table().filter(|_| key == "store") else {
            continue;
        };
        for store_key in store.keys() {
            if !KNOWN_STORE_KEYS.contains(&store_key.as_str()) {
                tracing::warn!(key = %format!("store.{store_key}"), "Unknown key in config file, ignoring");
            }
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Tests
// ============================================================================
