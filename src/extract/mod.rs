//! Content extraction for fetched HTML pages
//!
//! This module turns a response body into a [`Page`]:
//! - decodes the body (UTF-8, or Latin-1 when the response declares it)
//! - strips scripts, navigation chrome and ad containers
//! - builds the structured document, clean text and keyword index
//! - infers navigation and SEO data from the unstripped markup
//! - scores quality and accessibility
//!
//! It also discovers the outbound links the crawler should follow.

mod document;
mod keywords;
mod navigation;
mod scoring;
mod seo;

pub use document::{
    extract_structured, CodeBlock, Heading, Image, Link, LinkStatus, LinkType, ListBlock,
    ListKind, StructuredDocument, Table,
};
pub use keywords::{extract_keywords, MAX_KEYWORDS};
pub use navigation::{classify_path, infer_navigation, Navigation, PageType};
pub use scoring::{accessibility, quality_score, readability_score, Accessibility, QualitySignals};
pub use seo::{extract_seo, SeoData};

use crate::url::{is_allowed_host, is_binary_asset, normalize, resolve_link};
use chrono::{DateTime, Utc};
use regex::bytes::Regex as BytesRegex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Elements removed before content extraction
const NON_CONTENT_SELECTOR: &str = "script, style, noscript, template, nav, footer, aside, \
     advertisement, .advertisement, .ads, .ad-container, [id^=\"google_ads\"]";

const WORDS_PER_MINUTE: usize = 200;

/// Errors raised while turning a response body into a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Response body is not readable as {charset}")]
    UnreadableBody { charset: String },
}

/// The parts of the HTTP response the extractor records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseInfo {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl ResponseInfo {
    /// The `charset` parameter of the Content-Type header, lowercased
    pub fn declared_charset(&self) -> Option<String> {
        self.content_type.as_deref().and_then(|content_type| {
            content_type.split(';').skip(1).find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
            })
        })
    }

    /// True for `text/html` and XHTML content types
    ///
    /// A response without a Content-Type is not HTML.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(|content_type| {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
    }
}

/// A harvested page, as stored in the `pages` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Source URL; the page identity
    pub url: String,
    pub title: String,
    pub content: PageContent,
    pub metadata: PageMetadata,
    pub navigation: Navigation,
    pub seo: SeoData,
    pub search: SearchFields,
    pub status: String,
    pub version: u32,
    pub quality_score: u32,
    pub accessibility: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Decoded markup as served
    pub raw_html: String,
    pub clean_text: String,
    pub structured: StructuredDocument,
    /// MD5 of `clean_text`, lowercase hex
    pub content_hash: String,
    pub word_count: u32,
    /// Minutes, never below 1
    pub reading_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub scraped_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    /// Set by the worker once the owning job is known
    pub scraping_job_id: Option<i64>,
    /// Seconds
    pub response_time: f64,
    pub status_code: u16,
    pub content_length: u64,
    pub language: String,
    pub charset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFields {
    /// Title and clean text, space separated
    pub searchable_text: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// Extracts a page from a fetched response body
///
/// # Arguments
///
/// * `body` - Raw response bytes
/// * `source_url` - Final URL of the response, used to resolve relative links
/// * `response` - Status and headers of the response
/// * `elapsed` - Time taken by the request
///
/// # Errors
///
/// Returns `ExtractError::UnreadableBody` when the body cannot be decoded.
pub fn extract(
    body: &[u8],
    source_url: &Url,
    response: &ResponseInfo,
    elapsed: Duration,
) -> Result<Page, ExtractError> {
    let declared = response.declared_charset();
    let (markup, decoded_as) = decode_body(body, declared.as_deref())?;

    let full = Html::parse_document(&markup);
    let mut stripped = Html::parse_document(&markup);
    strip_non_content(&mut stripped);

    let title = select(&full, "title")
        .into_iter()
        .next()
        .map(text_of)
        .unwrap_or_default();

    let structured = extract_structured(&stripped, source_url);
    let clean_text = collapse_whitespace(&stripped.root_element().text().collect::<String>());
    let word_count = clean_text.split_whitespace().count();
    let content_hash = format!("{:x}", md5::compute(clean_text.as_bytes()));

    let navigation = infer_navigation(&full, source_url);
    let seo = extract_seo(&full);
    let keywords = extract_keywords(&clean_text, MAX_KEYWORDS);

    let mut signals = QualitySignals::from_document(&structured);
    signals.has_main_landmark = !select(&full, "main, [role=\"main\"]").is_empty();
    signals.has_nav_landmark = !select(&full, "nav, [role=\"navigation\"]").is_empty();
    signals.has_meta_description = !select(&full, "meta[name=\"description\"]").is_empty();
    signals.has_title = !select(&full, "title").is_empty();

    let image_alts: Vec<String> = select(&stripped, "img")
        .into_iter()
        .map(|image| attr(image, "alt"))
        .collect();
    let accessibility = accessibility(&image_alts, structured.headings.len(), &clean_text);

    let language = full
        .root_element()
        .value()
        .attr("lang")
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or("en")
        .to_string();
    let charset = declared
        .or_else(|| meta_charset(&full))
        .unwrap_or(decoded_as);

    let now = Utc::now();
    let searchable_text = format!("{} {}", title, clean_text);

    Ok(Page {
        url: source_url.to_string(),
        title,
        content: PageContent {
            raw_html: markup,
            clean_text,
            structured,
            content_hash,
            word_count: word_count as u32,
            reading_time: std::cmp::max(1, word_count / WORDS_PER_MINUTE) as u32,
        },
        metadata: PageMetadata {
            scraped_at: now,
            last_updated: now,
            last_modified: response.last_modified.clone(),
            etag: response.etag.clone(),
            scraping_job_id: None,
            response_time: elapsed.as_secs_f64(),
            status_code: response.status_code,
            content_length: body.len() as u64,
            language,
            charset,
        },
        navigation,
        seo,
        search: SearchFields {
            searchable_text,
            keywords,
            ..SearchFields::default()
        },
        status: "processed".to_string(),
        version: 1,
        quality_score: quality_score(&signals),
        accessibility,
    })
}

/// Outbound links worth crawling, in first-seen order
///
/// Links are taken from the unstripped document so navigation menus and
/// footers still feed the frontier. Each link must resolve to http(s), sit
/// on an allowed host and not point at a binary asset. Sitemap links are
/// always kept when their host is allowed.
pub fn discover_links(document: &Html, base: &Url, allowed_domains: &[String]) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in select(document, "a[href]") {
        let href = attr(anchor, "href");
        let Some(mut resolved) = resolve_link(&href, base) else {
            continue;
        };
        resolved.set_fragment(None);

        let host_allowed = resolved
            .host_str()
            .map(|host| is_allowed_host(host, allowed_domains))
            .unwrap_or(false);
        if !host_allowed {
            continue;
        }

        let is_sitemap = href.to_ascii_lowercase().contains("sitemap");
        if is_binary_asset(&resolved) && !is_sitemap {
            continue;
        }

        if seen.insert(normalize(resolved.as_str())) {
            links.push(resolved);
        }
    }

    links
}

/// Decodes `body`, returning the text and the charset it was read as
fn decode_body(body: &[u8], declared: Option<&str>) -> Result<(String, String), ExtractError> {
    let charset = declared
        .map(str::to_string)
        .or_else(|| sniff_meta_charset(body));

    match charset.as_deref() {
        Some(label) if is_latin1_label(label) => {
            Ok((body.iter().map(|&b| b as char).collect(), label.to_string()))
        }
        Some(label) if !is_utf8_label(label) => Err(ExtractError::UnreadableBody {
            charset: label.to_string(),
        }),
        label => {
            let label = label.unwrap_or("utf-8").to_string();
            let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
            match std::str::from_utf8(body) {
                Ok(text) => Ok((text.to_string(), label)),
                Err(_) => Err(ExtractError::UnreadableBody { charset: label }),
            }
        }
    }
}

fn is_utf8_label(label: &str) -> bool {
    matches!(label, "utf-8" | "utf8" | "us-ascii" | "ascii")
}

fn is_latin1_label(label: &str) -> bool {
    matches!(
        label,
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" | "windows-1252" | "cp1252"
    )
}

fn meta_charset_pattern() -> &'static BytesRegex {
    static META_CHARSET: OnceLock<BytesRegex> = OnceLock::new();
    META_CHARSET.get_or_init(|| {
        BytesRegex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_\-]+)"#)
            .expect("valid meta charset regex")
    })
}

/// Charset declared by a `<meta>` tag in the first 1024 bytes
fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(1024)];
    meta_charset_pattern()
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_ascii_lowercase())
}

fn meta_charset(document: &Html) -> Option<String> {
    select(document, "meta[charset]")
        .into_iter()
        .next()
        .map(|meta| attr(meta, "charset").trim().to_ascii_lowercase())
        .filter(|charset| !charset.is_empty())
}

fn strip_non_content(document: &mut Html) {
    let ids: Vec<_> = select(document, NON_CONTENT_SELECTOR)
        .into_iter()
        .map(|element| element.id())
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All elements of `document` matching `css`; an invalid selector matches nothing
pub(crate) fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Descendants of `element` matching `css`
pub(crate) fn select_within<'a>(element: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Text content with runs of whitespace collapsed to single spaces
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Attribute value, or an empty string
pub(crate) fn attr(element: ElementRef<'_>, name: &str) -> String {
    element.value().attr(name).unwrap_or("").to_string()
}

pub(crate) fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}
