//! Chapters stored in SQLite with an FTS5 index kept in step by the
//! application, plus spell correction over the index vocabulary.
//!
//! Chapter writes go through [`ChapterSession`], whose save path updates
//! `chapters_fts` inside the same transaction as the primary rows.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{default_content_root, AppSettings, ConfigError, DatabaseTarget};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::chapter::{Chapter, ChapterId, ChapterValidationError};
pub use model::projection::{ChapterHit, SpellSuggestion};
pub use model::user::{User, UserId};
pub use repo::chapter_repo::{
    ChapterListQuery, ChapterRepository, RepoError, RepoResult, ScanMode, SqliteChapterRepository,
};
pub use repo::session::{ChangedChapter, ChapterSession, EntryKey, EntryState, SaveReport};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use search::catalog::{query_catalog, run_catalog, CatalogOutcome, CatalogRows};
pub use search::fts::{quote_terms, search_chapters, ChapterSearch, MatchOperator, SearchOrder};
pub use search::spellfix::{suggest_words, SpellQuery};
pub use search::sync::{rebuild_chapter_fts, update_chapter_fts, FtsSyncReport};
pub use search::{SearchError, SearchResult};
pub use service::context::{AppContext, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
