//! Keeps `chapters_fts` consistent with primary-table writes.
//!
//! # Responsibility
//! - Translate tracked chapter changes into FTS5 insert/`'delete'` commands.
//! - Refresh the spell-correction vocabulary after index changes.
//!
//! # Invariants
//! - Runs on the caller's transaction; nothing here commits.
//! - `'delete'` receives the OLD rowid and the OLD normalized values, exactly
//!   as they were indexed. Passing anything else corrupts an external-content
//!   index (`database disk image is malformed`).
//! - For modifications the delete is always issued before the insert.

use super::normalize::normalize_text;
use super::spellfix::{refresh_vocabulary, VocabularyRefresh};
use super::SearchResult;
use crate::model::chapter::Chapter;
use crate::repo::session::{ChangedChapter, EntryState};
use log::{debug, info};
use rusqlite::{params, Connection, TransactionBehavior};

const FTS_INSERT_SQL: &str = "INSERT INTO chapters_fts (rowid, \"text\", title) VALUES (?1, ?2, ?3);";
const FTS_DELETE_SQL: &str =
    "INSERT INTO chapters_fts (chapters_fts, rowid, \"text\", title) VALUES ('delete', ?1, ?2, ?3);";

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtsSyncReport {
    /// Rows (re)inserted into the index.
    pub indexed: usize,
    /// Rows removed from the index.
    pub removed: usize,
    /// Changes that required no index work.
    pub skipped: usize,
    /// Present when the spell-correction vocabulary was refreshed.
    pub vocabulary: Option<VocabularyRefresh>,
}

impl FtsSyncReport {
    pub fn index_changed(&self) -> bool {
        self.indexed > 0 || self.removed > 0
    }
}

/// Applies `changes` to `chapters_fts`.
///
/// `conn` is expected to be inside the transaction that performed the
/// primary writes, and `current.id` must already hold the assigned rowid.
pub fn update_chapter_fts(conn: &Connection, changes: &[ChangedChapter]) -> SearchResult<FtsSyncReport> {
    let mut report = FtsSyncReport::default();

    for change in changes {
        match change.state {
            EntryState::Added => {
                if should_skip_added(&change.current) {
                    report.skipped += 1;
                    continue;
                }
                index_chapter(conn, &change.current)?;
                report.indexed += 1;
            }
            EntryState::Modified => {
                if should_skip_modified(&change.current, &change.original) {
                    report.skipped += 1;
                    continue;
                }
                unindex_chapter(conn, &change.original)?;
                index_chapter(conn, &change.current)?;
                report.removed += 1;
                report.indexed += 1;
            }
            EntryState::Deleted => {
                unindex_chapter(conn, &change.original)?;
                report.removed += 1;
            }
            EntryState::Unchanged => report.skipped += 1,
        }
    }

    if report.index_changed() {
        report.vocabulary = Some(refresh_vocabulary(conn)?);
    }

    debug!(
        "event=fts_sync module=search status=ok indexed={} removed={} skipped={}",
        report.indexed, report.removed, report.skipped
    );
    Ok(report)
}

/// Drops every index row and re-indexes all chapters from their normalized
/// values, then refreshes the vocabulary. Runs in its own transaction.
///
/// FTS5's `'rebuild'` command is not used: it would index the raw stored
/// values, which disagree with what later `'delete'` commands pass.
pub fn rebuild_chapter_fts(conn: &mut Connection) -> SearchResult<FtsSyncReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("INSERT INTO chapters_fts (chapters_fts) VALUES ('delete-all');", [])?;

    let mut report = FtsSyncReport::default();
    {
        let mut stmt = tx.prepare("SELECT id, title, \"text\", user_id FROM chapters ORDER BY id;")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let chapter = Chapter {
                id: row.get(0)?,
                title: row.get(1)?,
                text: row.get(2)?,
                user_id: row.get(3)?,
            };
            index_chapter(&tx, &chapter)?;
            report.indexed += 1;
        }
    }

    report.vocabulary = Some(refresh_vocabulary(&tx)?);
    tx.commit()?;

    info!(
        "event=fts_rebuild module=search status=ok indexed={}",
        report.indexed
    );
    Ok(report)
}

fn index_chapter(conn: &Connection, chapter: &Chapter) -> SearchResult<()> {
    conn.execute(
        FTS_INSERT_SQL,
        params![
            chapter.id,
            normalize_text(&chapter.text),
            normalize_text(&chapter.title)
        ],
    )?;
    Ok(())
}

fn unindex_chapter(conn: &Connection, chapter: &Chapter) -> SearchResult<()> {
    conn.execute(
        FTS_DELETE_SQL,
        params![
            chapter.id,
            normalize_text(&chapter.text),
            normalize_text(&chapter.title)
        ],
    )?;
    Ok(())
}

/// Hook for excluding freshly added chapters from the index. Currently every
/// chapter is indexed.
fn should_skip_added(_chapter: &Chapter) -> bool {
    false
}

/// A modification only matters to the index when an indexed column changed.
fn should_skip_modified(current: &Chapter, original: &Chapter) -> bool {
    !current.search_fields_differ(original)
}
