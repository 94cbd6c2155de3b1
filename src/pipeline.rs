//! One feed build: candidates → selection → item details → entries → RSS → disk.
//!
//! Only three failures abort a build: the candidate list cannot be fetched,
//! the document cannot be rendered, or it cannot be written. Everything that
//! goes wrong with an individual item is counted in the [`BuildReport`] and
//! the build carries on with the remaining items.
use crate::config::Config;
use crate::feed::{render, select, write_atomic, EntryMapper, FeedEntry, MapOutcome};
use crate::feed::{RenderError, WriteError};
use crate::hn::{fetch_items, fetch_top_comments, FetchError, HnClient, RawItem};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// How many times `limit` ids are fetched when a score filter is active.
const MIN_SCORE_OVERSAMPLE: usize = 3;

/// Counts describing what a build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Ids read from the candidate list.
    pub candidates: usize,
    /// Ids whose details were requested.
    pub selected: usize,
    /// Items whose details were fetched.
    pub fetched: usize,
    /// Items whose details could not be fetched (errors, deadline).
    pub fetch_failures: usize,
    /// Fetched items the mapper rejected.
    pub skipped: usize,
    /// Entries carrying a quoted top comment.
    pub top_comments: usize,
    /// Entries in the written feed.
    pub rendered: usize,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}/{} items, {} failed, {} skipped, {} rendered",
            self.fetched, self.selected, self.fetch_failures, self.skipped, self.rendered
        )
    }
}

/// Fatal build failures. The output file is untouched in every case.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to fetch candidate list: {0}")]
    Candidates(#[source] FetchError),

    #[error("Failed to render feed ({report}): {source}")]
    Render {
        source: RenderError,
        report: BuildReport,
    },

    #[error("Failed to write feed ({report}): {source}")]
    Write {
        source: WriteError,
        report: BuildReport,
    },
}

impl BuildError {
    /// Counts gathered before the failure, if the build got that far.
    pub fn report(&self) -> Option<&BuildReport> {
        match self {
            BuildError::Candidates(_) => None,
            BuildError::Render { report, .. } | BuildError::Write { report, .. } => Some(report),
        }
    }
}

/// Runs one build and writes the feed to `output`.
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `client` - API client (built from the same config)
/// * `output` - Destination path, replaced atomically
/// * `build_time` - Timestamp rendered as `<lastBuildDate>`
///
/// # Behavior
///
/// - `run_deadline_secs` bounds every fetch phase, starting with the
///   candidate list
/// - With `min_score` set, a longer prefix of the ranking is fetched and the
///   feed is filled in ranking order until it holds `limit` entries
/// - Top comments are fetched only for stories that made it into the feed
///
/// # Errors
///
/// See [`BuildError`]. Item-level problems are never errors.
pub async fn build_feed(
    config: &Config,
    client: &HnClient,
    output: &Path,
    build_time: DateTime<Utc>,
) -> Result<BuildReport, BuildError> {
    let deadline_at = Instant::now() + Duration::from_secs(config.run_deadline_secs);
    let mut report = BuildReport::default();

    let candidates = tokio::time::timeout_at(
        deadline_at,
        client.fetch_top_item_ids(config.max_candidates),
    )
    .await
    .unwrap_or(Err(FetchError::DeadlineExceeded))
    .map_err(BuildError::Candidates)?;
    report.candidates = candidates.len();

    let selected = select(&candidates, fetch_window(config));
    report.selected = selected.len();
    tracing::info!(
        candidates = report.candidates,
        selected = report.selected,
        "Selected candidate items"
    );

    let fetched = fetch_items(client, &selected, config.concurrency, deadline_at).await;
    report.fetched = fetched.items.len();
    report.fetch_failures = fetched.failures.len();

    let mapper = EntryMapper::from_config(config);
    let (accepted, skipped) = screen_items(&mapper, fetched.items, config.limit);
    report.skipped = skipped;

    let comments = if config.top_comments {
        fetch_top_comments(client, &accepted, config.concurrency, deadline_at).await
    } else {
        HashMap::new()
    };

    let (entries, skipped) = map_items(&mapper, accepted, &comments);
    report.skipped += skipped;
    report.top_comments = entries
        .iter()
        .filter(|e| comments.contains_key(&e.item_id))
        .count();
    report.rendered = entries.len();

    let document = render(&config.feed_meta(), &entries, build_time).map_err(|source| {
        BuildError::Render {
            source,
            report: report.clone(),
        }
    })?;

    write_atomic(output, &document).map_err(|source| BuildError::Write {
        source,
        report: report.clone(),
    })?;

    tracing::info!(
        path = %output.display(),
        fetched = report.fetched,
        failed = report.fetch_failures,
        skipped = report.skipped,
        top_comments = report.top_comments,
        rendered = report.rendered,
        "Feed build complete"
    );

    Ok(report)
}

/// Number of ranked ids whose details are fetched.
fn fetch_window(config: &Config) -> usize {
    if config.min_score > 0 {
        config.limit.saturating_mul(MIN_SCORE_OVERSAMPLE)
    } else {
        config.limit
    }
}

/// Keeps eligible items in order until `limit` are accepted.
///
/// Returns the accepted items and the number rejected. Items after the
/// feed is full are neither accepted nor counted as skipped.
fn screen_items(
    mapper: &EntryMapper,
    items: Vec<RawItem>,
    limit: usize,
) -> (Vec<RawItem>, usize) {
    let total = items.len();
    let mut accepted = Vec::with_capacity(limit.min(total));
    let mut skipped = 0;
    let mut examined = 0;

    for item in items {
        if accepted.len() >= limit {
            break;
        }
        examined += 1;
        match mapper.screen(&item) {
            Ok(()) => accepted.push(item),
            Err(reason) => {
                tracing::info!(id = item.id, reason = %reason, "Skipping item");
                skipped += 1;
            }
        }
    }

    if examined < total {
        tracing::debug!(unused = total - examined, "Feed is full, ignoring remaining items");
    }

    (accepted, skipped)
}

/// Maps items in order, returning the entries and the number skipped.
fn map_items(
    mapper: &EntryMapper,
    items: Vec<RawItem>,
    comments: &HashMap<u64, String>,
) -> (Vec<FeedEntry>, usize) {
    let mut entries = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        let comment = comments.get(&item.id).map(String::as_str);
        match mapper.map_with_comment(item, comment) {
            MapOutcome::Entry(entry) => entries.push(entry),
            MapOutcome::Skipped { id, reason } => {
                tracing::info!(id = id, reason = %reason, "Skipping item");
                skipped += 1;
            }
        }
    }

    (entries, skipped)
}
