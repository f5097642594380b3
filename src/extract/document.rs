//! Structured document model
//!
//! One typed field per content shape, each filled by an independent rule over
//! the stripped document.

use crate::extract::{attr, has_class, select, select_within, text_of};
use crate::url::resolve_link;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use url::Url;

/// Every content shape found on a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub code_blocks: Vec<CodeBlock>,
    pub images: Vec<Image>,
    pub links: Vec<Link>,
    pub tables: Vec<Table>,
    pub lists: Vec<ListBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// 1 through 6
    pub level: u8,
    pub text: String,
    pub id: String,
    /// `#id`, or empty when the heading has no id
    pub anchor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
    pub title: String,
    pub caption: String,
    /// Always None: assets are never downloaded
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Anchor,
    Internal,
    External,
}

/// Liveness of a stored link, updated by the link validation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Valid,
    Broken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub title: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub caption: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBlock {
    #[serde(rename = "type")]
    pub kind: ListKind,
    pub items: Vec<String>,
}

/// Paragraphs this short are navigation crumbs or boilerplate
const MIN_PARAGRAPH_CHARS: usize = 10;

/// Runs every shape rule over an already-stripped document
pub fn extract_structured(document: &Html, base: &Url) -> StructuredDocument {
    StructuredDocument {
        headings: extract_headings(document),
        paragraphs: extract_paragraphs(document),
        code_blocks: extract_code_blocks(document),
        images: extract_images(document, base),
        links: extract_links(document, base),
        tables: extract_tables(document),
        lists: extract_lists(document),
    }
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    select(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .map(|element| {
            let level = element.value().name()[1..].parse().unwrap_or(1);
            let id = attr(element, "id");
            let anchor = if id.is_empty() {
                String::new()
            } else {
                format!("#{}", id)
            };
            Heading {
                level,
                text: text_of(element),
                id,
                anchor,
            }
        })
        .collect()
}

fn extract_paragraphs(document: &Html) -> Vec<String> {
    select(document, "p")
        .into_iter()
        .map(text_of)
        .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect()
}

fn extract_code_blocks(document: &Html) -> Vec<CodeBlock> {
    select(document, "pre, code")
        .into_iter()
        // a <code> inside a <pre> belongs to the <pre> block
        .filter(|element| {
            element.value().name() != "code"
                || !element
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|ancestor| ancestor.value().name() == "pre")
        })
        .map(|element| {
            let language = code_language(element)
                .or_else(|| {
                    select_within(element, "code")
                        .into_iter()
                        .find_map(code_language)
                })
                .unwrap_or_default();
            CodeBlock {
                language,
                content: element.text().collect(),
                file_name: attr(element, "data-filename"),
            }
        })
        .collect()
}

/// Language from a `language-xxx` or `lang-xxx` class token
fn code_language(element: ElementRef) -> Option<String> {
    element.value().classes().find_map(|class| {
        class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .filter(|lang| !lang.is_empty())
            .map(str::to_string)
    })
}

fn extract_images(document: &Html, base: &Url) -> Vec<Image> {
    select(document, "img[src]")
        .into_iter()
        .filter_map(|element| {
            let src = attr(element, "src");
            let src = base.join(src.trim()).ok()?.to_string();
            Some(Image {
                src,
                alt: attr(element, "alt"),
                title: attr(element, "title"),
                caption: image_caption(element),
                local_path: None,
            })
        })
        .collect()
}

/// Caption from an enclosing `<figure><figcaption>` or the next
/// `p`/`div`/`span` sibling carrying the `caption` class
fn image_caption(image: ElementRef) -> String {
    let figure = image
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "figure");

    if let Some(figcaption) = figure.and_then(|f| select_within(f, "figcaption").into_iter().next())
    {
        return text_of(figcaption);
    }

    image
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| matches!(sibling.value().name(), "p" | "div" | "span"))
        .filter(|sibling| has_class(*sibling, "caption"))
        .map(text_of)
        .unwrap_or_default()
}

fn extract_links(document: &Html, base: &Url) -> Vec<Link> {
    select(document, "a[href]")
        .into_iter()
        .filter_map(|element| {
            let text = text_of(element);
            if text.is_empty() {
                return None;
            }

            let raw_href = attr(element, "href");
            let raw_href = raw_href.trim();

            let (href, link_type) = if raw_href.starts_with('#') {
                let href = base.join(raw_href).ok()?.to_string();
                (href, LinkType::Anchor)
            } else {
                let resolved = resolve_link(raw_href, base)?;
                let link_type = if resolved.host_str() == base.host_str() {
                    LinkType::Internal
                } else {
                    LinkType::External
                };
                (resolved.to_string(), link_type)
            };

            Some(Link {
                href,
                text,
                title: attr(element, "title"),
                link_type,
                status: LinkStatus::Pending,
            })
        })
        .collect()
}

fn extract_tables(document: &Html) -> Vec<Table> {
    select(document, "table")
        .into_iter()
        .filter_map(extract_table)
        .collect()
}

fn extract_table(table: ElementRef) -> Option<Table> {
    let mut headers = Vec::new();
    let mut body_rows: Vec<ElementRef> = select_within(table, "tr")
        .into_iter()
        .filter(|row| {
            !row.ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| ancestor.value().name() == "thead")
        })
        .collect();

    if let Some(thead) = select_within(table, "thead").into_iter().next() {
        headers = select_within(thead, "th, td").into_iter().map(text_of).collect();
    } else if let Some(first) = body_rows.first().copied() {
        let cells = row_cells(first);
        if !cells.is_empty() && cells.iter().all(|cell| cell.value().name() == "th") {
            headers = cells.into_iter().map(text_of).collect();
            body_rows.remove(0);
        }
    }

    let rows: Vec<Vec<String>> = body_rows
        .into_iter()
        .map(|row| row_cells(row).into_iter().map(text_of).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        return None;
    }

    let caption = select_within(table, "caption")
        .into_iter()
        .next()
        .map(text_of)
        .unwrap_or_default();

    Some(Table {
        headers,
        rows,
        caption,
    })
}

fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    select_within(row, "th, td")
}

fn extract_lists(document: &Html) -> Vec<ListBlock> {
    select(document, "ul, ol")
        .into_iter()
        .filter_map(|list| {
            let items: Vec<String> = select_within(list, "li").into_iter().map(text_of).collect();
            if items.is_empty() {
                return None;
            }
            let kind = if list.value().name() == "ol" {
                ListKind::Ordered
            } else {
                ListKind::Unordered
            };
            Some(ListBlock { kind, items })
        })
        .collect()
}
