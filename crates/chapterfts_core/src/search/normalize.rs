//! Text normalization applied before values reach `chapters_fts`.
//!
//! # Invariants
//! - The exact same normalization must be applied when a row is indexed and
//!   when it is later removed with the FTS5 `'delete'` command.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Returns the index form of a title or body.
///
/// Blank input becomes an empty string; markup tags are removed.
pub fn normalize_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    HTML_TAG_RE.replace_all(text, "").into_owned()
}
