//! Reading-order blocks of a page
//!
//! Headings (h1-h3) and paragraphs/list items are kept in document order so
//! segmenters can group adjacent text under the heading it belongs to.

use crate::crawler::collapse_whitespace;
use crate::crawler::extractor::{element_text, in_excluded_subtree};
use scraper::{Html, Selector};

/// A heading or a run of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        text: String,
        /// Element `id` (or `name`) usable as a URL fragment
        anchor: Option<String>,
    },
    Paragraph {
        text: String,
    },
}

impl Block {
    pub fn text(&self) -> &str {
        match self {
            Self::Heading { text, .. } | Self::Paragraph { text } => text,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, Self::Heading { .. })
    }
}

/// Splits HTML into blocks in reading order
///
/// Non-content subtrees are skipped, as are "skip to content" links. If no
/// heading, paragraph or list item carries text, the body text is split on
/// line breaks instead.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();

    if let Ok(selector) = Selector::parse("h1, h2, h3, p, li") {
        for element in document.select(&selector) {
            if in_excluded_subtree(&element) {
                continue;
            }
            let text = element_text(element);
            if text.is_empty() || text.eq_ignore_ascii_case("skip to content") {
                continue;
            }

            match element.value().name() {
                "h1" | "h2" | "h3" => {
                    let anchor = element
                        .value()
                        .attr("id")
                        .or_else(|| element.value().attr("name"))
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(String::from);
                    blocks.push(Block::Heading { text, anchor });
                }
                _ => blocks.push(Block::Paragraph { text }),
            }
        }
    }

    if blocks.is_empty() {
        let body_text = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next())
            .map(|body| body.text().collect::<String>())
            .unwrap_or_default();
        blocks = text_to_blocks(&body_text);
    }

    blocks
}

/// One paragraph block per non-blank line
pub fn text_to_blocks(text: &str) -> Vec<Block> {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .map(|text| Block::Paragraph { text })
        .collect()
}

/// Keeps the leading blocks whose text (plus per-block overhead) fits `cap`
pub fn cap_blocks(blocks: &[Block], cap: usize) -> &[Block] {
    const PER_BLOCK_OVERHEAD: usize = 16;

    let mut total = 0;
    for (i, block) in blocks.iter().enumerate() {
        total += block.text().chars().count() + PER_BLOCK_OVERHEAD;
        if total > cap {
            return &blocks[..i];
        }
    }
    blocks
}
