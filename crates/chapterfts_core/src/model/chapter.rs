//! Chapter entity.
//!
//! # Responsibility
//! - Define the primary row whose title/text feed the full-text index.
//! - Validate write-side invariants before SQL mutations.
//!
//! # Invariants
//! - `id` is the `chapters_fts` rowid once persisted.
//! - `user_id` always references an existing author.

use super::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rowid of a `chapters` row, shared with `chapters_fts.rowid`.
pub type ChapterId = i64;

/// Validation failures for chapter writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterValidationError {
    /// Chapter is not attached to an author.
    MissingUser,
    /// Negative ids never come from SQLite and indicate a corrupted caller.
    InvalidId(ChapterId),
}

impl Display for ChapterValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUser => write!(f, "chapter must reference a user"),
            Self::InvalidId(id) => write!(f, "invalid chapter id {id}"),
        }
    }
}

impl Error for ChapterValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    /// Raw body; may contain HTML markup that is stripped only for indexing.
    pub text: String,
    pub user_id: UserId,
}

impl Chapter {
    /// Creates an unsaved chapter for `user_id`.
    pub fn new(user_id: UserId, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            text: text.into(),
            user_id,
        }
    }

    /// Returns whether the chapter has been assigned a rowid.
    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// Returns whether the indexed columns differ from `other`.
    pub fn search_fields_differ(&self, other: &Self) -> bool {
        self.title != other.title || self.text != other.text
    }

    pub fn validate(&self) -> Result<(), ChapterValidationError> {
        if self.id < 0 {
            return Err(ChapterValidationError::InvalidId(self.id));
        }
        if self.user_id <= 0 {
            return Err(ChapterValidationError::MissingUser);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Chapter, ChapterValidationError};

    #[test]
    fn validate_requires_user() {
        let chapter = Chapter::new(0, "t", "x");
        assert_eq!(chapter.validate(), Err(ChapterValidationError::MissingUser));
    }

    #[test]
    fn search_fields_differ_ignores_user_change() {
        let a = Chapter::new(1, "title", "body");
        let mut b = a.clone();
        b.user_id = 2;
        assert!(!a.search_fields_differ(&b));
        b.text.push('!');
        assert!(a.search_fields_differ(&b));
    }
}
