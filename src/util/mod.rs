//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL handling**: base-URL validation and link parsing for feed entries
//! - **Text processing**: XML-safe sanitizing and whitespace normalization
//!
//! # Examples
//!
//! ```
//! use hnrss::util::{collapse_whitespace, strip_control_chars, validate_base_url};
//!
//! let base = validate_base_url("https://news.ycombinator.com/").unwrap();
//! assert_eq!(base, "https://news.ycombinator.com");
//!
//! assert_eq!(strip_control_chars("a\u{0}b"), "ab");
//! assert_eq!(collapse_whitespace(" a \n b "), "a b");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, strip_control_chars};
pub use url_validator::{display_host, parse_link, validate_base_url, UrlValidationError};
