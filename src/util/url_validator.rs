use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// Base URLs are joined with path segments, so they must not carry a
    /// query string or fragment.
    #[error("Base URL must not contain a query or fragment")]
    QueryOrFragment,
}

/// Validates a base URL used to build request or discussion-page URLs.
///
/// Accepts absolute `http`/`https` URLs with a host and no query/fragment.
/// Returns the URL as a string with any trailing slash removed, ready for
/// `format!("{base}/item/{id}.json")` style joining.
///
/// Unlike links inside the feed, base URLs may point at loopback hosts so
/// that a local mirror or a test server can stand in for the real API.
///
/// # Examples
///
/// ```
/// use hnrss::util::validate_base_url;
///
/// let base = validate_base_url("https://hacker-news.firebaseio.com/v0/").unwrap();
/// assert_eq!(base, "https://hacker-news.firebaseio.com/v0");
///
/// assert!(validate_base_url("ftp://example.com").is_err());
/// assert!(validate_base_url("https://example.com/?q=1").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<String, UrlValidationError> {
    let url = parse_web_url(url_str.trim())?;

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::QueryOrFragment);
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Parses a link taken from upstream item data.
///
/// Returns `None` for anything that is not an absolute `http`/`https` URL
/// with a host; callers fall back to the discussion page in that case.
pub fn parse_link(url_str: &str) -> Option<Url> {
    parse_web_url(url_str.trim()).ok()
}

/// Host of a link for display, without a leading `www.`.
pub fn display_host(url: &Url) -> &str {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host)
}

fn parse_web_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}
