//! Heuristic quality and accessibility scoring

use crate::extract::document::StructuredDocument;
use serde::{Deserialize, Serialize};

/// Inputs to the quality score, gathered from the structured document and
/// the unstripped page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualitySignals {
    pub headings: usize,
    pub paragraphs: usize,
    pub images: usize,
    pub images_with_alt: usize,
    pub links: usize,
    /// Words across all kept paragraphs
    pub paragraph_words: usize,
    pub has_main_landmark: bool,
    pub has_nav_landmark: bool,
    pub has_meta_description: bool,
    pub has_title: bool,
}

impl QualitySignals {
    /// Counts the document-derived signals; landmark and head flags start false
    pub fn from_document(document: &StructuredDocument) -> Self {
        Self {
            headings: document.headings.len(),
            paragraphs: document.paragraphs.len(),
            images: document.images.len(),
            images_with_alt: document
                .images
                .iter()
                .filter(|image| has_alt(&image.alt))
                .count(),
            links: document.links.len(),
            paragraph_words: document
                .paragraphs
                .iter()
                .map(|p| p.split_whitespace().count())
                .sum(),
            ..Self::default()
        }
    }
}

/// Additive 0-100 score
///
/// | Signal | Points |
/// |--------|--------|
/// | any heading | 20 |
/// | 3+ paragraphs | 15 |
/// | any image | 10, plus 2 per image with alt text (max 10) |
/// | any link | 10 |
/// | paragraph words 300+ / 100+ | 15 / 10 |
/// | main landmark, nav landmark, meta description, title | 5 each |
pub fn quality_score(signals: &QualitySignals) -> u32 {
    let mut score = 0;

    if signals.headings > 0 {
        score += 20;
    }
    if signals.paragraphs >= 3 {
        score += 15;
    }
    if signals.images > 0 {
        score += 10;
        score += (signals.images_with_alt as u32).saturating_mul(2).min(10);
    }
    if signals.links > 0 {
        score += 10;
    }
    if signals.paragraph_words >= 300 {
        score += 15;
    } else if signals.paragraph_words >= 100 {
        score += 10;
    }

    for present in [
        signals.has_main_landmark,
        signals.has_nav_landmark,
        signals.has_meta_description,
        signals.has_title,
    ] {
        if present {
            score += 5;
        }
    }

    score.min(100)
}

/// Accessibility summary of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessibility {
    /// True when every image has non-empty alt text (and when there are none)
    pub has_alt_text: bool,
    pub has_headings: bool,
    /// Never measured
    pub color_contrast: String,
    pub readability_score: f64,
}

/// Whitespace-only alt text counts as missing
fn has_alt(alt: &str) -> bool {
    !alt.trim().is_empty()
}

/// Builds the accessibility summary
///
/// `image_alts` holds the alt attribute of every `<img>` in the stripped
/// document, `text` its clean text.
pub fn accessibility(image_alts: &[String], heading_count: usize, text: &str) -> Accessibility {
    Accessibility {
        has_alt_text: image_alts.iter().all(|alt| has_alt(alt)),
        has_headings: heading_count > 0,
        color_contrast: "unknown".to_string(),
        readability_score: readability_score(text),
    }
}

/// `max(0, 100 - 2 * words per sentence)`, sentences being the pieces
/// between periods
pub fn readability_score(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    let sentences = text.split('.').count();
    let average = words as f64 / sentences as f64;
    (100.0 - average * 2.0).max(0.0)
}
