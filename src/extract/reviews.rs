//! Review collection and clean-up.

use std::sync::OnceLock;

use regex::Regex;

use super::dom::DomNode;
use crate::profile::ReviewSelectors;

/// Longest review kept, in characters, including the ellipsis marker.
pub const MAX_REVIEW_CHARS: usize = 600;

/// Most reviews returned per page.
pub const MAX_REVIEWS: usize = 20;

pub const ELLIPSIS: char = '\u{2026}';

/// Furthest a cut may back up to reach whitespace before it becomes a hard
/// cut, in characters.
const MAX_BOUNDARY_BACKTRACK: usize = 40;

fn read_more_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*read\s+more[.\u{2026}]*\s*$").ok())
        .as_ref()
}

/// Remove a trailing "Read more" control label.
pub fn strip_read_more(text: &str) -> String {
    let trimmed = text.trim();
    match read_more_suffix() {
        Some(re) => re.replace(trimmed, "").trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Shorten `text` to at most `MAX_REVIEW_CHARS` characters, cutting at the
/// last word boundary and appending an ellipsis. Short input is returned
/// as-is, so applying this twice changes nothing.
pub fn truncate_review(text: &str) -> String {
    if text.chars().count() <= MAX_REVIEW_CHARS {
        return text.to_string();
    }

    let budget = MAX_REVIEW_CHARS - 1;
    let cut = text
        .char_indices()
        .nth(budget)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..cut];

    // Back up to whitespace unless the next char already starts a new word.
    let at_boundary = text[cut..].starts_with(char::is_whitespace);
    let near = |space: usize| head[space..].chars().count() <= MAX_BOUNDARY_BACKTRACK;
    let head = if at_boundary {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(space) if space > 0 && near(space) => &head[..space],
            _ => head,
        }
    };

    let mut out = head.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}

/// Text of one review container: its text sub-node when present, otherwise
/// the container itself, with whitespace collapsed.
fn review_text<N: DomNode>(container: &N, selectors: &ReviewSelectors) -> String {
    let raw = container
        .select_first(&selectors.text)
        .map(|n| n.text_content())
        .unwrap_or_else(|| container.text_content());
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collect, clean and cap the reviews under `root`.
pub fn collect_reviews<N: DomNode>(root: &N, selectors: &ReviewSelectors) -> Vec<String> {
    root.select_all(&selectors.container)
        .iter()
        .skip(selectors.skip)
        .map(|container| {
            truncate_review(&strip_read_more(&review_text(container, selectors)))
        })
        .filter(|review| !review.is_empty())
        .take(MAX_REVIEWS)
        .collect()
}
