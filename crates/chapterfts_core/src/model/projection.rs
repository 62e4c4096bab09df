//! Keyless rows returned by search queries.

use super::chapter::ChapterId;
use serde::Serialize;

/// One row of a `chapters_fts` query.
///
/// `title`/`text` are either the stored values or their highlighted/snippet
/// form, depending on how the query was issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterHit {
    pub rowid: ChapterId,
    pub title: String,
    pub text: String,
    /// FTS5 `rank`; lower is more relevant. `None` when SQLite returns NULL.
    pub rank: Option<f64>,
}

/// One spell-correction candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpellSuggestion {
    pub word: String,
    /// Number of index rows the word occurs in.
    pub rank: i64,
    /// Weighted edit distance from the query word.
    pub distance: u32,
    /// Ordering key: distance adjusted in favour of frequent words.
    pub score: i64,
    /// Characters of the candidate taken into account.
    pub matchlen: u32,
}

#[cfg(test)]
mod tests {
    use super::{ChapterHit, SpellSuggestion};

    #[test]
    fn hit_serializes_null_rank() {
        let hit = ChapterHit {
            rowid: 4,
            title: "Handle markup in text".to_string(),
            text: "<b>funny</b>".to_string(),
            rank: None,
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["rowid"], 4);
        assert!(value["rank"].is_null());
    }

    #[test]
    fn suggestion_serializes_every_field() {
        let suggestion = SpellSuggestion {
            word: "فارسي".to_string(),
            rank: 1,
            distance: 150,
            score: 181,
            matchlen: 5,
        };
        let value = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(value["word"], "فارسي");
        assert_eq!(value["score"], 181);
        assert_eq!(value.as_object().unwrap().len(), 5);
    }
}
