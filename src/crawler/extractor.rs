//! HTML content extraction
//!
//! This module turns a fetched or rendered HTML document into:
//! - The page title (first `<title>`)
//! - Readable body text with tables linearized into `header: value` rows
//! - Outgoing links (absolute, duplicate-free, in document order)
//! - The declared canonical URL, if any
//!
//! Script, style, noscript, nav, header and footer subtrees are ignored for
//! text, tables and links alike.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose subtrees carry no page content
const EXCLUDED_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer"];

/// Elements that do not break words when their text is joined
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark",
    "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Content extracted from one HTML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Trimmed text of the first `<title>`, empty when absent
    pub title: String,

    /// Whitespace-collapsed body text followed by linearized tables
    pub text: String,

    /// Absolute link targets, duplicate-free, in discovery order
    pub links: Vec<String>,

    /// Declared canonical URL resolved against the page URL
    pub canonical_url: Option<String>,
}

/// Extracts title, text, links and canonical URL from HTML
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The page URL, used to resolve relative links
///
/// # Example
///
/// ```
/// use site_corpus::crawler::extract;
/// use url::Url;
///
/// let html = r#"<html><head><title>Fees</title></head>
///     <body><nav><a href="/menu">Menu</a></nav><p>Tuition is due in May.</p>
///     <a href="/pay">Pay</a></body></html>"#;
/// let base = Url::parse("https://example.edu/fees").unwrap();
/// let content = extract(html, &base);
///
/// assert_eq!(content.title, "Fees");
/// assert_eq!(content.text, "Tuition is due in May. Pay");
/// assert_eq!(content.links, vec!["https://example.edu/pay".to_string()]);
/// ```
pub fn extract(html: &str, base_url: &Url) -> ExtractedContent {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let canonical_url = extract_canonical(&document, base_url);
    let links = extract_links(&document, base_url);

    let mut text = String::new();
    match select_first(&document, "body") {
        Some(body) => collect_text(body, &mut text),
        None => collect_text(document.root_element(), &mut text),
    }

    for table in select_content(&document, "table") {
        let linearized = linearize_table(table);
        if !linearized.is_empty() {
            text.push(' ');
            text.push_str(&linearized);
        }
    }

    ExtractedContent {
        title,
        text: collapse_whitespace(&text),
        links,
        canonical_url,
    }
}

/// Collapses every whitespace run to one space and trims the ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Selects matching elements that are not inside a non-content subtree
fn select_content<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|element| !in_excluded_subtree(element))
        .collect()
}

pub(crate) fn in_excluded_subtree(element: &ElementRef) -> bool {
    element.ancestors().chain(std::iter::once(**element)).any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| EXCLUDED_TAGS.contains(&e.name()))
    })
}

/// Appends the text of `element`'s content descendants to `out`
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }

        let Some(child_element) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_element.value().name();
        if EXCLUDED_TAGS.contains(&name) {
            continue;
        }

        let block = !INLINE_TAGS.contains(&name);
        if block {
            out.push(' ');
        }
        collect_text(child_element, out);
        if block {
            out.push(' ');
        }
    }
}

pub(crate) fn element_text(element: ElementRef) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    collapse_whitespace(&text)
}

fn extract_title(document: &Html) -> String {
    select_first(document, "title")
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Finds the canonical URL: `link[rel=canonical]`, then `og:url`, then `twitter:url`
fn extract_canonical(document: &Html, base_url: &Url) -> Option<String> {
    let candidates = [
        ("link[rel~=\"canonical\"][href]", "href"),
        ("meta[property=\"og:url\"][content]", "content"),
        ("meta[name=\"twitter:url\"][content]", "content"),
    ];

    let declared = candidates.iter().find_map(|(selector, attr)| {
        select_first(document, selector)
            .and_then(|element| element.value().attr(attr))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })?;

    base_url.join(declared).ok().map(String::from)
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in select_content(document, "a[href]") {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
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

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Linearizes a table into `header: value` rows
///
/// The first row supplies the headers; cells without a header are labeled
/// `col_N` (1-based). Rows whose cells are all empty are skipped. Pairs are
/// joined by `, ` and rows by ` | `.
fn linearize_table(table: ElementRef) -> String {
    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("th, td"))
    else {
        return String::new();
    };

    let mut rows = table.select(&row_selector);
    let Some(header_row) = rows.next() else {
        return String::new();
    };
    let headers: Vec<String> = header_row.select(&cell_selector).map(element_text).collect();

    let mut lines = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let pairs: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, value)| match headers.get(i).filter(|h| !h.is_empty()) {
                Some(header) => format!("{}: {}", header, value),
                None => format!("col_{}: {}", i + 1, value),
            })
            .collect();
        lines.push(pairs.join(", "));
    }

    lines.join(" | ")
}
