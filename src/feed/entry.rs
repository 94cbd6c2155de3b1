use crate::config::Config;
use crate::hn::RawItem;
use crate::util::{collapse_whitespace, display_host, parse_link};
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use thiserror::Error;

/// Item types that become feed entries.
const ELIGIBLE_TYPES: &[&str] = &["story"];

/// A renderer-ready feed entry.
///
/// Text fields hold raw, unescaped text. `id` and `link` are never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Stable identifier for feed-reader dedup: the discussion-page URL.
    pub id: String,
    pub item_id: u64,
    pub title: String,
    /// External URL, or the discussion page for self-posts.
    pub link: String,
    pub comments_url: String,
    pub author: Option<String>,
    pub published: DateTime<Utc>,
    /// HTML fragment for the entry description.
    pub summary: Option<String>,
    pub score: Option<u64>,
    pub comment_count: Option<u64>,
}

/// Why an item did not become an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("item was deleted")]
    Deleted,
    #[error("item is dead (flagged or killed)")]
    Dead,
    #[error("ineligible item type '{0}'")]
    IneligibleType(String),
    #[error("missing title")]
    MissingTitle,
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
    #[error("score {score} below minimum {min}")]
    BelowMinScore { score: u64, min: u64 },
}

/// Result of mapping one [`RawItem`].
#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Entry(FeedEntry),
    Skipped { id: u64, reason: SkipReason },
}

/// Converts upstream items into [`FeedEntry`] records.
#[derive(Debug, Clone)]
pub struct EntryMapper {
    site_base: String,
    min_score: u64,
}

impl EntryMapper {
    /// `site_base` is where discussion pages live, e.g.
    /// `https://news.ycombinator.com`. A `min_score` of 0 disables the
    /// score filter.
    pub fn new(site_base: &str, min_score: u64) -> Self {
        Self {
            site_base: site_base.trim_end_matches('/').to_string(),
            min_score,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.site_base, config.min_score)
    }

    /// Canonical discussion-page URL for an item.
    pub fn discussion_url(&self, id: u64) -> String {
        format!("{}/item?id={}", self.site_base, id)
    }

    /// Maps one item, or says why it was skipped.
    pub fn map(&self, item: RawItem) -> MapOutcome {
        self.map_with_comment(item, None)
    }

    /// Like [`EntryMapper::map`], quoting `top_comment` (upstream HTML) in
    /// the summary.
    pub fn map_with_comment(&self, item: RawItem, top_comment: Option<&str>) -> MapOutcome {
        match self.check(&item) {
            Ok((title, published)) => {
                MapOutcome::Entry(self.build_entry(item, title, published, top_comment))
            }
            Err(reason) => MapOutcome::Skipped {
                id: item.id,
                reason,
            },
        }
    }

    /// Eligibility check alone, without building the entry.
    pub fn screen(&self, item: &RawItem) -> Result<(), SkipReason> {
        self.check(item).map(|_| ())
    }

    /// Returns the cleaned title and publication time of an eligible item.
    fn check(&self, item: &RawItem) -> Result<(String, DateTime<Utc>), SkipReason> {
        if item.deleted {
            return Err(SkipReason::Deleted);
        }
        if item.dead {
            return Err(SkipReason::Dead);
        }

        let item_type = item.item_type.as_deref().unwrap_or("");
        if !ELIGIBLE_TYPES.contains(&item_type) {
            return Err(SkipReason::IneligibleType(item_type.to_string()));
        }

        let title = item
            .title
            .as_deref()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .ok_or(SkipReason::MissingTitle)?
            .into_owned();

        let time = item.time.ok_or(SkipReason::MissingTimestamp)?;
        let published =
            DateTime::<Utc>::from_timestamp(time, 0).ok_or(SkipReason::InvalidTimestamp(time))?;

        if self.min_score > 0 {
            let score = item.score.unwrap_or(0);
            if score < self.min_score {
                return Err(SkipReason::BelowMinScore {
                    score,
                    min: self.min_score,
                });
            }
        }

        Ok((title, published))
    }

    fn build_entry(
        &self,
        item: RawItem,
        title: String,
        published: DateTime<Utc>,
        top_comment: Option<&str>,
    ) -> FeedEntry {
        let comments_url = self.discussion_url(item.id);
        let external = item.url.as_deref().and_then(parse_link);
        let link = external
            .as_ref()
            .map(|u| u.as_str().to_string())
            .unwrap_or_else(|| comments_url.clone());

        let author = item
            .by
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        let summary = build_summary(&SummaryParts {
            external: external.as_ref(),
            text: item.text.as_deref(),
            top_comment,
            score: item.score,
            author: author.as_deref(),
            comments_url: &comments_url,
            comment_count: item.descendants,
        });

        FeedEntry {
            id: comments_url.clone(),
            item_id: item.id,
            title,
            link,
            comments_url,
            author,
            published,
            summary: Some(summary),
            score: item.score,
            comment_count: item.descendants,
        }
    }
}

struct SummaryParts<'a> {
    external: Option<&'a url::Url>,
    text: Option<&'a str>,
    top_comment: Option<&'a str>,
    score: Option<u64>,
    author: Option<&'a str>,
    comments_url: &'a str,
    comment_count: Option<u64>,
}

/// Builds the HTML description: source, self-post body, top comment,
/// points/author and a link to the discussion.
///
/// `text` and `top_comment` are already HTML upstream and are embedded
/// as-is; every other value is escaped for HTML here. The XML writer escapes
/// the whole fragment again at render time.
fn build_summary(parts: &SummaryParts<'_>) -> String {
    let mut html = Vec::with_capacity(5);

    if let Some(url) = parts.external {
        html.push(format!(
            r#"<p><strong>Source:</strong> <a href="{}">{}</a></p>"#,
            escape(url.as_str()),
            escape(display_host(url))
        ));
    }

    if let Some(text) = non_blank(parts.text) {
        html.push(format!("<p>{}</p>", text));
    }

    if let Some(comment) = non_blank(parts.top_comment) {
        html.push(format!(
            "<hr/><p><strong>Top comment:</strong></p><blockquote><p>{}</p></blockquote>",
            comment
        ));
    }

    html.push(format!(
        "<p><strong>Points:</strong> {} | <strong>Author:</strong> {}</p>",
        parts.score.unwrap_or(0),
        escape(parts.author.unwrap_or("unknown"))
    ));

    let comments_label = match parts.comment_count {
        Some(1) => "1 comment".to_string(),
        Some(n) => format!("{} comments", n),
        None => "Discussion".to_string(),
    };
    html.push(format!(
        r#"<p><a href="{}">{}</a></p>"#,
        escape(parts.comments_url),
        comments_label
    ));

    html.concat()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
