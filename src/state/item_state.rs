/// Item state definitions for tracking one frontier item through the pipeline
///
/// Every dequeued item walks this state machine exactly once. The happy path is
/// `Dequeued → Fetched → Parsed → [Rendered] → [Recognized] → Validated →
/// Stored → LinksEnqueued → Delayed`; any stage may branch to `Dropped`, which
/// is still followed by the politeness delay.
use std::fmt;

/// Represents the current state of an item in the crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item was taken from the frontier
    Dequeued,

    /// The fetch returned a resource
    Fetched,

    /// Static HTML was extracted
    Parsed,

    /// Rendered HTML replaced the static extraction
    Rendered,

    /// Text was recovered via OCR or a PDF text layer
    Recognized,

    /// Text passed the length gate
    Validated,

    // ===== Outcome States =====
    /// Record was appended to the corpus
    Stored,

    /// Outbound links were pushed to the frontier
    LinksEnqueued,

    /// Item was abandoned; see [`DropReason`]
    Dropped,

    // ===== Final State =====
    /// Politeness delay has elapsed; the loop returns to its head
    Delayed,
}

/// Why an item ended in [`ItemState::Dropped`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Disallowed by robots.txt
    RobotsDenied,
    /// Permanent HTTP failure or retries exhausted
    FetchFailed,
    /// The fetched (or canonical) URL is already in the corpus
    AlreadyStored,
    /// Content type is neither HTML, PDF nor an image
    UnsupportedContent,
    /// Best available text is below the content-type minimum
    TextTooShort,
    /// The store refused the append
    StoreFailed,
}

impl ItemState {
    /// Returns true if the state ends the item's processing (before the delay)
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::LinksEnqueued | Self::Dropped)
    }

    /// Returns true once the item has been written to the corpus
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored | Self::LinksEnqueued)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;

        if next == Dropped {
            return matches!(
                self,
                Dequeued | Fetched | Parsed | Rendered | Recognized | Validated
            );
        }

        matches!(
            (self, next),
            (Dequeued, Fetched)
                | (Fetched, Parsed)
                | (Fetched, Recognized)
                | (Parsed, Rendered)
                | (Parsed, Recognized)
                | (Parsed, Validated)
                | (Rendered, Recognized)
                | (Rendered, Validated)
                | (Recognized, Validated)
                | (Validated, Stored)
                | (Stored, LinksEnqueued)
                | (LinksEnqueued, Delayed)
                | (Dropped, Delayed)
        )
    }

    /// Lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dequeued => "dequeued",
            Self::Fetched => "fetched",
            Self::Parsed => "parsed",
            Self::Rendered => "rendered",
            Self::Recognized => "recognized",
            Self::Validated => "validated",
            Self::Stored => "stored",
            Self::LinksEnqueued => "links_enqueued",
            Self::Dropped => "dropped",
            Self::Delayed => "delayed",
        }
    }
}

impl DropReason {
    /// Returns all drop reasons, in summary order
    pub fn all() -> [DropReason; 6] {
        [
            Self::RobotsDenied,
            Self::FetchFailed,
            Self::AlreadyStored,
            Self::UnsupportedContent,
            Self::TextTooShort,
            Self::StoreFailed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RobotsDenied => "robots_denied",
            Self::FetchFailed => "fetch_failed",
            Self::AlreadyStored => "already_stored",
            Self::UnsupportedContent => "unsupported_content",
            Self::TextTooShort => "text_too_short",
            Self::StoreFailed => "store_failed",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
