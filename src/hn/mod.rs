//! Source side of the pipeline: the Hacker News Firebase API.
//!
//! - [`client`] - HTTP client with retries, timeouts and size limits
//! - [`fetcher`] - Concurrent item and top-comment fetching under a run deadline
//! - [`item`] - Wire types ([`RawItem`], [`StoryList`])
//! - `throttle` - Optional minimum spacing between requests
//!
//! # Example
//!
//! ```ignore
//! use hnrss::hn::{fetch_items, HnClient};
//!
//! let deadline_at = Instant::now() + Duration::from_secs(30);
//! let client = HnClient::new(&config)?;
//! let ids = client.fetch_top_item_ids(30).await?;
//! let report = fetch_items(&client, &ids, 8, deadline_at).await;
//! ```

pub mod client;
pub mod fetcher;
pub mod item;
mod throttle;

pub use client::{FetchError, HnClient};
pub use fetcher::{fetch_items, fetch_top_comments, FetchReport, ItemFailure};
pub use item::{RawItem, StoryList};
