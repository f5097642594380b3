use crate::{UrlError, UrlResult};
use url::Url;

/// Parses an absolute http(s) URL and returns its lowercase host
///
/// # Examples
///
/// ```
/// use site_harvest::url::host_of;
///
/// assert_eq!(host_of("https://Docs.Example.com/intro").unwrap(), "docs.example.com");
/// assert!(host_of("mailto:ops@example.com").is_err());
/// ```
pub fn host_of(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
    }

    parsed
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))
}

/// Checks if a host matches a domain pattern
///
/// `example.com` matches only itself; `*.example.com` matches the bare
/// domain and any subdomain of it.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Returns true if `host` matches any of the allowed domain patterns
pub fn is_allowed_host(host: &str, allowed_domains: &[String]) -> bool {
    let host = host.to_lowercase();
    allowed_domains
        .iter()
        .any(|pattern| matches_wildcard(&pattern.to_lowercase(), &host))
}
