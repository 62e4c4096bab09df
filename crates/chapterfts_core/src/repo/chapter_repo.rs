//! Chapter repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide read APIs over the primary `chapters` table.
//! - Provide the row-level writes used by [`ChapterSession`](super::session::ChapterSession).
//!
//! # Invariants
//! - Write paths call `Chapter::validate()` before SQL mutations.
//! - Writes here never touch `chapters_fts`; index maintenance belongs to the
//!   session's save path.

use crate::db::DbError;
use crate::model::chapter::{Chapter, ChapterId, ChapterValidationError};
use crate::model::user::UserId;
use crate::search::SearchError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CHAPTER_SELECT_SQL: &str = "SELECT id, title, \"text\", user_id FROM chapters";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence, change tracking and index maintenance.
#[derive(Debug)]
pub enum RepoError {
    Validation(ChapterValidationError),
    Db(DbError),
    /// Index synchronization failed; the enclosing save was rolled back.
    Search(SearchError),
    NotFound { entity: &'static str, id: i64 },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "full-text index update failed: {err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid chapter data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ChapterValidationError> for RepoError {
    fn from(value: ChapterValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SearchError> for RepoError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Where a full-table scan looks for its needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Contains,
    StartsWith,
    EndsWith,
}

/// Query options for listing chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterListQuery {
    pub user_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Read-side repository interface for chapters.
pub trait ChapterRepository {
    fn get_chapter(&self, id: ChapterId) -> RepoResult<Option<Chapter>>;
    /// Lowest-id chapter, if any.
    fn first_chapter(&self) -> RepoResult<Option<Chapter>>;
    fn list_chapters(&self, query: &ChapterListQuery) -> RepoResult<Vec<Chapter>>;
    fn count_chapters(&self) -> RepoResult<u64>;
    /// Matches `text` with `LIKE`, bypassing the full-text index.
    ///
    /// Every row is visited; this exists to contrast with `chapters_fts`.
    fn scan_chapters(&self, mode: ScanMode, needle: &str) -> RepoResult<Vec<Chapter>>;
}

/// SQLite-backed chapter repository.
pub struct SqliteChapterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteChapterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ChapterRepository for SqliteChapterRepository<'_> {
    fn get_chapter(&self, id: ChapterId) -> RepoResult<Option<Chapter>> {
        load_chapter(self.conn, id)
    }

    fn first_chapter(&self) -> RepoResult<Option<Chapter>> {
        let chapter = self
            .conn
            .query_row(
                &format!("{CHAPTER_SELECT_SQL} ORDER BY id ASC LIMIT 1;"),
                [],
                parse_chapter_row,
            )
            .optional()?;
        Ok(chapter)
    }

    fn list_chapters(&self, query: &ChapterListQuery) -> RepoResult<Vec<Chapter>> {
        let mut sql = format!("{CHAPTER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(user_id) = query.user_id {
            sql.push_str(" AND user_id = ?");
            bind_values.push(Value::Integer(user_id));
        }

        sql.push_str(" ORDER BY id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1");
        }
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let chapters = stmt
            .query_map(params_from_iter(bind_values), parse_chapter_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chapters)
    }

    fn count_chapters(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chapters;", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
    }

    fn scan_chapters(&self, mode: ScanMode, needle: &str) -> RepoResult<Vec<Chapter>> {
        let escaped = escape_like(needle);
        let pattern = match mode {
            ScanMode::Contains => format!("%{escaped}%"),
            ScanMode::StartsWith => format!("{escaped}%"),
            ScanMode::EndsWith => format!("%{escaped}"),
        };

        let mut stmt = self.conn.prepare(&format!(
            "{CHAPTER_SELECT_SQL} WHERE \"text\" LIKE ?1 ESCAPE '\\' ORDER BY id ASC;"
        ))?;
        let chapters = stmt
            .query_map([pattern], parse_chapter_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chapters)
    }
}

pub(crate) fn load_chapter(conn: &Connection, id: ChapterId) -> RepoResult<Option<Chapter>> {
    let chapter = conn
        .query_row(
            &format!("{CHAPTER_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_chapter_row,
        )
        .optional()?;
    Ok(chapter)
}

/// Inserts a chapter row and returns its rowid. A zero `id` lets SQLite assign one.
pub(crate) fn insert_chapter(conn: &Connection, chapter: &Chapter) -> RepoResult<ChapterId> {
    chapter.validate()?;

    let explicit_id = chapter.is_persisted().then_some(chapter.id);
    conn.execute(
        "INSERT INTO chapters (id, title, \"text\", user_id) VALUES (?1, ?2, ?3, ?4);",
        params![
            explicit_id,
            chapter.title.as_str(),
            chapter.text.as_str(),
            chapter.user_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn update_chapter(conn: &Connection, chapter: &Chapter) -> RepoResult<()> {
    chapter.validate()?;

    let changed = conn.execute(
        "UPDATE chapters SET title = ?1, \"text\" = ?2, user_id = ?3 WHERE id = ?4;",
        params![
            chapter.title.as_str(),
            chapter.text.as_str(),
            chapter.user_id,
            chapter.id
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "chapter",
            id: chapter.id,
        });
    }
    Ok(())
}

pub(crate) fn delete_chapter(conn: &Connection, id: ChapterId) -> RepoResult<()> {
    let changed = conn.execute("DELETE FROM chapters WHERE id = ?1;", [id])?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "chapter",
            id,
        });
    }
    Ok(())
}

fn parse_chapter_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get("id")?,
        title: row.get("title")?,
        text: row.get("text")?,
        user_id: row.get("user_id")?,
    })
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_guards_wildcards() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("cat"), "cat");
    }
}
