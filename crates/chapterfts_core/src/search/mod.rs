//! Full-text search over chapters.
//!
//! # Responsibility
//! - Keep `chapters_fts` in step with primary-table writes (`sync`).
//! - Expose FTS5 queries, spell correction and the sample query catalog.
//!
//! # Invariants
//! - Index rows always hold normalized values (see `normalize`).
//! - The spell-correction vocabulary is refreshed whenever the index changes.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;
pub mod fts;
pub mod normalize;
pub mod spellfix;
pub mod sync;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided expression cannot be parsed by FTS5.
    InvalidQuery { query: String, message: String },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidQuery { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
