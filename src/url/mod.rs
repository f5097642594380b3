//! URL handling module for Site-Harvest
//!
//! This module provides the dedup normalizer, host extraction, allowed-domain
//! matching, link resolution and the binary-asset filter used during link
//! discovery.

mod domain;
mod normalize;

pub use domain::{host_of, is_allowed_host, matches_wildcard};
pub use normalize::normalize;

use url::Url;

/// Path extensions that never lead to an HTML page
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "zip", "gz", "tar", "rar", "7z",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "mp3", "mp4", "avi", "mov", "exe", "dmg", "iso",
];

/// Resolves an href found on `base` into an absolute http(s) URL
///
/// Returns None for hrefs that should not be followed:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - anything that does not resolve to http or https
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

/// Returns true if the URL path ends in a known binary asset extension
pub fn is_binary_asset(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    let last_segment = path.rsplit('/').next().unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((_, ext)) => BINARY_EXTENSIONS.contains(&ext),
        None => false,
    }
}
