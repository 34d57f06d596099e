//! Escalation classifier
//!
//! Decides whether a page's static markup is a client-side application shell
//! whose content only appears after scripts run.

use scraper::{Html, Selector};

/// Substrings (matched case-insensitively) that mark a client-side mount point
const ROOT_MARKERS: &[&str] = &[
    "id=\"root\"",
    "id=\"app\"",
    "id=\"__next\"",
    "id=\"___gatsby\"",
    "data-reactroot",
    "ng-version",
    "data-server-rendered",
    "__nuxt__",
    "__next_data__",
];

/// Pages with more script tags than this look script-driven
const SCRIPT_COUNT_THRESHOLD: usize = 20;

/// Text shorter than this is considered sparse
const SPARSE_TEXT_CHARS: usize = 400;

/// Text per element below this is considered sparse
const MIN_TEXT_DENSITY: f64 = 1.5;

/// Returns true when the page likely needs a full render to expose its content
///
/// Both a structural signal (a known mount-point marker or many script tags)
/// and a content signal (little text overall, or little text per element)
/// must be present. A structural signal alone never triggers a render.
///
/// # Arguments
///
/// * `html` - Raw markup as fetched
/// * `text` - Text already extracted from that markup
pub fn needs_dynamic_rendering(html: &str, text: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let has_marker = ROOT_MARKERS.iter().any(|marker| lower.contains(marker));

    let document = Html::parse_document(html);
    let script_count = Selector::parse("script")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0);

    if !has_marker && script_count <= SCRIPT_COUNT_THRESHOLD {
        return false;
    }

    let text_len = text.chars().count();
    if text_len < SPARSE_TEXT_CHARS {
        return true;
    }

    let element_count = document
        .root_element()
        .descendants()
        .filter(|node| node.value().is_element())
        .count()
        .max(1);

    (text_len as f64 / element_count as f64) < MIN_TEXT_DENSITY
}
