//! Navigation inference: breadcrumbs, next/prev links, page type and section

use crate::extract::{attr, select, select_within, text_of};
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// Where a page sits in the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub breadcrumb: Vec<String>,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
    /// First path segment
    pub section: Option<String>,
    /// Second path segment
    pub subsection: Option<String>,
    pub page_type: PageType,
    /// Position in the site menu; not inferred, always 0
    pub menu_position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Home,
    Article,
    Blog,
    Documentation,
    About,
    Contact,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Article => "article",
            Self::Blog => "blog",
            Self::Documentation => "documentation",
            Self::About => "about",
            Self::Contact => "contact",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "article" => Some(Self::Article),
            "blog" => Some(Self::Blog),
            "documentation" => Some(Self::Documentation),
            "about" => Some(Self::About),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }
}

/// Tried in order; the first match wins
const BREADCRUMB_SELECTORS: &[&str] = &[
    ".breadcrumb",
    ".breadcrumbs",
    "[aria-label=\"breadcrumb\"]",
    ".nav-breadcrumb",
    "#breadcrumb",
];

fn next_pattern() -> &'static Regex {
    static NEXT: OnceLock<Regex> = OnceLock::new();
    NEXT.get_or_init(|| Regex::new(r"(?i)next|continue|forward").expect("valid next-link regex"))
}

fn prev_pattern() -> &'static Regex {
    static PREV: OnceLock<Regex> = OnceLock::new();
    PREV.get_or_init(|| Regex::new(r"(?i)previous|back|prev").expect("valid prev-link regex"))
}

/// Infers navigation from the unstripped document and the page URL
pub fn infer_navigation(document: &Html, url: &Url) -> Navigation {
    let (page_type, section, subsection) = classify_path(url);

    Navigation {
        breadcrumb: extract_breadcrumb(document),
        next_page: find_link_by_text(document, url, next_pattern()),
        prev_page: find_link_by_text(document, url, prev_pattern()),
        section,
        subsection,
        page_type,
        menu_position: 0,
    }
}

fn extract_breadcrumb(document: &Html) -> Vec<String> {
    BREADCRUMB_SELECTORS
        .iter()
        .find_map(|css| select(document, css).into_iter().next())
        .map(|container| {
            select_within(container, "a, span")
                .into_iter()
                .map(text_of)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn find_link_by_text(document: &Html, base: &Url, pattern: &Regex) -> Option<String> {
    select(document, "a[href]")
        .into_iter()
        .find(|link| pattern.is_match(&text_of(*link)))
        .and_then(|link| base.join(attr(link, "href").trim()).ok())
        .map(|resolved| resolved.to_string())
}

/// Page type, section and subsection from the URL path segments
pub fn classify_path(url: &Url) -> (PageType, Option<String>, Option<String>) {
    let segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let Some(first) = segments.first() else {
        return (PageType::Home, None, None);
    };

    let page_type = match first.to_ascii_lowercase().as_str() {
        "blog" => PageType::Blog,
        "docs" | "documentation" => PageType::Documentation,
        "about" => PageType::About,
        "contact" => PageType::Contact,
        _ => PageType::Article,
    };

    let section = Some(first.to_string());
    let subsection = segments.get(1).map(|s| s.to_string());

    (page_type, section, subsection)
}
