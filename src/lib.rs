//! Builds an RSS 2.0 feed of Hacker News stories.
//!
//! The crate is organized along the build pipeline:
//!
//! - [`hn`] - Fetching ranked ids and item details from the Firebase API
//! - [`feed`] - Selecting, mapping, rendering and atomically writing the feed
//! - [`pipeline`] - Wiring the stages together for one run
//! - [`config`] - Defaults, TOML file and validation
//! - [`util`] - URL and text helpers

pub mod config;
pub mod feed;
pub mod hn;
pub mod pipeline;
pub mod util;

pub use config::{Config, ConfigError};
pub use pipeline::{build_feed, BuildError, BuildReport};
