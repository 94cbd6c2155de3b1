//! Configuration for a feed build.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional TOML file (`--config`), then command-line flags. The file is
//! optional: a missing or empty file yields `Config::default()`. Unknown keys
//! are ignored by serde but logged as warnings.
use crate::feed::FeedMeta;
use crate::hn::StoryList;
use crate::util::validate_base_url;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

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

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Everything a build needs, threaded explicitly through the pipeline.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Firebase API base, e.g. `https://hacker-news.firebaseio.com/v0`.
    pub api_base: String,

    /// Where discussion pages live, e.g. `https://news.ycombinator.com`.
    pub site_base: String,

    /// Which ranked list to build the feed from.
    pub list: StoryList,

    /// Number of entries to select. 0 builds an empty feed.
    pub limit: usize,

    /// Upper bound on ids read from the candidate list.
    pub max_candidates: usize,

    /// Skip stories with fewer points than this. 0 disables the filter.
    ///
    /// When set, up to three times `limit` ids are fetched so that filtered
    /// stories are replaced by lower-ranked ones.
    pub min_score: u64,

    /// Quote each story's first live reply in its description.
    pub top_comments: bool,

    /// Per-request timeout in seconds, covering headers and body.
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff, in milliseconds.
    pub retry_backoff_ms: u64,

    /// Maximum number of item fetches in flight.
    pub concurrency: usize,

    /// Budget for all fetching in a run, in seconds. It starts before the
    /// candidate list is requested and also bounds item and comment fetches.
    pub run_deadline_secs: u64,

    /// Minimum spacing between request starts, in milliseconds. 0 = off.
    pub min_request_interval_ms: u64,

    pub user_agent: String,

    /// Channel metadata, the `[feed]` table.
    pub feed: FeedConfig,
}

/// The `[feed]` table. Unset values are derived from the story list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub self_link: Option<String>,
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://hacker-news.firebaseio.com/v0".to_string(),
            site_base: "https://news.ycombinator.com".to_string(),
            list: StoryList::Top,
            limit: 30,
            max_candidates: 500,
            min_score: 0,
            top_comments: true,
            request_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
            concurrency: 8,
            run_deadline_secs: 30,
            min_request_interval_ms: 0,
            user_agent: concat!("hnrss/", env!("CARGO_PKG_VERSION")).to_string(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            link: None,
            self_link: None,
            language: "en-us".to_string(),
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "api_base",
    "site_base",
    "list",
    "limit",
    "max_candidates",
    "min_score",
    "top_comments",
    "request_timeout_secs",
    "max_retries",
    "retry_backoff_ms",
    "concurrency",
    "run_deadline_secs",
    "min_request_interval_ms",
    "user_agent",
    "feed",
];

const KNOWN_FEED_KEYS: &[&str] = &["title", "description", "link", "self_link", "language"];

/// Inclusive bounds on `concurrency`.
const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=64;

/// Upper bound on `max_retries`.
const MAX_RETRIES_LIMIT: u32 = 10;

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// The result is not validated; call [`Config::validate`] once CLI
    /// overrides have been applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
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
            Ok(_) => {} // Size is within limits, proceed
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

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, KNOWN_KEYS, "");
            if let Some(toml::Value::Table(feed)) = raw.get("feed") {
                warn_unknown_keys(feed, KNOWN_FEED_KEYS, "feed.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), list = ?config.list, "Loaded configuration");
        Ok(config)
    }

    /// Checks ranges and normalizes base URLs (trailing slashes removed).
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.api_base = validate_base_url(&self.api_base)
            .map_err(|e| ConfigError::Invalid(format!("api_base: {}", e)))?;
        self.site_base = validate_base_url(&self.site_base)
            .map_err(|e| ConfigError::Invalid(format!("site_base: {}", e)))?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.run_deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "run_deadline_secs must be at least 1".to_string(),
            ));
        }
        if !CONCURRENCY_RANGE.contains(&self.concurrency) {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be between {} and {}, got {}",
                CONCURRENCY_RANGE.start(),
                CONCURRENCY_RANGE.end(),
                self.concurrency
            )));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid(
                "max_candidates must be at least 1".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".to_string()));
        }
        if let Some(self_link) = non_blank(self.feed.self_link.as_deref()) {
            if crate::util::parse_link(&self_link).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "feed.self_link is not an http(s) URL: {}",
                    self_link
                )));
            }
        }

        Ok(self)
    }

    /// Channel metadata, falling back to list-specific defaults.
    ///
    /// Blank strings in the `[feed]` table count as unset.
    pub fn feed_meta(&self) -> FeedMeta {
        let title = non_blank(self.feed.title.as_deref())
            .unwrap_or_else(|| self.list.default_title().to_string());
        let description = non_blank(self.feed.description.as_deref())
            .unwrap_or_else(|| format!("{} from Hacker News", self.list.noun()));
        let link = non_blank(self.feed.link.as_deref())
            .unwrap_or_else(|| format!("{}/", self.site_base.trim_end_matches('/')));
        let language = non_blank(Some(self.feed.language.as_str()))
            .unwrap_or_else(|| FeedConfig::default().language);

        FeedMeta {
            title,
            description,
            link,
            self_link: non_blank(self.feed.self_link.as_deref()),
            language,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{}{}", prefix, key), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
