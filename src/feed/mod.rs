//! Feed side of the pipeline: selection, mapping, rendering and writing.
//!
//! - [`select`] - Truncates the ranked candidate list
//! - [`entry`] - Maps upstream items to [`FeedEntry`] records or tagged skips
//! - [`rss`] - Renders RSS 2.0 with `quick-xml`
//! - [`writer`] - Atomic temp-file-then-rename persistence
//!
//! # Example
//!
//! ```ignore
//! use hnrss::feed::{render, select, write_atomic, EntryMapper, MapOutcome};
//!
//! let ids = select(&candidates, 30);
//! let entries: Vec<_> = items
//!     .into_iter()
//!     .filter_map(|item| match mapper.map(item) {
//!         MapOutcome::Entry(entry) => Some(entry),
//!         MapOutcome::Skipped { .. } => None,
//!     })
//!     .collect();
//! let xml = render(&meta, &entries, Utc::now())?;
//! write_atomic(Path::new("feeds/hn.xml"), &xml)?;
//! ```

pub mod entry;
pub mod rss;
pub mod select;
pub mod writer;

pub use entry::{EntryMapper, FeedEntry, MapOutcome, SkipReason};
pub use rss::{format_rfc822, render, FeedMeta, RenderError};
pub use select::select;
pub use writer::{stage, write_atomic, StagedFile, WriteError};
