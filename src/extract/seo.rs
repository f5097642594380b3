use crate::extract::{attr, select};
use scraper::Html;
use serde::{Deserialize, Serialize};

/// Search-engine metadata declared by the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoData {
    pub meta_description: String,
    pub meta_keywords: Vec<String>,
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub canonical_url: String,
}

/// Reads SEO tags; every field is empty when its tag is missing
pub fn extract_seo(document: &Html) -> SeoData {
    let first_attr = |css: &str, name: &str| -> String {
        select(document, css)
            .into_iter()
            .next()
            .map(|element| attr(element, name))
            .unwrap_or_default()
    };

    let keywords = first_attr("meta[name=\"keywords\"]", "content");
    let meta_keywords = if keywords.trim().is_empty() {
        Vec::new()
    } else {
        keywords.split(',').map(|k| k.trim().to_string()).collect()
    };

    SeoData {
        meta_description: first_attr("meta[name=\"description\"]", "content"),
        meta_keywords,
        og_title: first_attr("meta[property=\"og:title\"]", "content"),
        og_description: first_attr("meta[property=\"og:description\"]", "content"),
        og_image: first_attr("meta[property=\"og:image\"]", "content"),
        canonical_url: first_attr("link[rel=\"canonical\"]", "href"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tags() {
        let document = Html::parse_document(
            r#"<head>
                <meta name="description" content="A guide">
                <meta name="keywords" content="rust, crawler ,sqlite">
                <meta property="og:title" content="Guide">
                <meta property="og:description" content="OG guide">
                <meta property="og:image" content="https://example.com/og.png">
                <link rel="canonical" href="https://example.com/guide">
            </head>"#,
        );
        let seo = extract_seo(&document);
        assert_eq!(seo.meta_description, "A guide");
        assert_eq!(seo.meta_keywords, vec!["rust", "crawler", "sqlite"]);
        assert_eq!(seo.og_title, "Guide");
        assert_eq!(seo.og_description, "OG guide");
        assert_eq!(seo.og_image, "https://example.com/og.png");
        assert_eq!(seo.canonical_url, "https://example.com/guide");
    }

    #[test]
    fn test_missing_tags_default_empty() {
        let seo = extract_seo(&Html::parse_document("<p>bare</p>"));
        assert_eq!(seo, SeoData::default());
    }
}
