//! Database initialization and scripted chapter edits.
//!
//! # Invariants
//! - Seeding happens only when `chapters` is empty.
//! - The seed author and every seed chapter are written by one save, so the
//!   rows, the index and the spell-correction table commit or roll back together.

use super::context::{AppContext, ServiceError, ServiceResult};
use crate::model::chapter::Chapter;
use crate::model::user::User;
use crate::repo::chapter_repo::{ChapterRepository, SqliteChapterRepository};
use crate::repo::session::{ChapterSession, SaveReport};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use log::info;

/// Suffix appended by [`touch_first_chapter`].
pub const MODIFIED_SUFFIX: &str = ", Modified";

const SEED_USER: &str = "Test User";

const SEED_CHAPTERS: &[(&str, &str)] = &[
    (
        "Learn SQlite FTS5",
        "This tutorial teaches you how to perform full-text search in SQLite using FTS5",
    ),
    (
        "Advanced SQlite Full-text Search",
        "Show you some advanced techniques in SQLite full-text searching",
    ),
    (
        "SQLite Tutorial",
        "Help you learn SQLite quickly and effectively",
    ),
    (
        "Handle markup in text",
        "<p>Isn't this <font face=\"Comic Sans\">funny</font>?",
    ),
    // unicode61 folds case and splits on Unicode spaces and punctuation, so
    // Persian terms are indexed and prefix-searchable like Latin ones.
    ("آزمايش متن فارسي", "براي نمونه تهيه شده‌است"),
    (
        "Exclude test 1",
        "in the years 2018-2019 something happened.",
    ),
    ("Exclude test 2", "It was 2018 and then it was 2019"),
];

/// Seeds the sample author and chapters when no chapter exists yet.
///
/// Returns `None` when the table already had rows.
pub fn seed_if_empty(session: &mut ChapterSession<'_>) -> ServiceResult<Option<SaveReport>> {
    let existing = SqliteChapterRepository::new(session.connection()).count_chapters()?;
    if existing > 0 {
        info!("event=db_seed module=service status=skip chapters={existing}");
        return Ok(None);
    }

    // The author id is assigned inside the save transaction.
    for (title, text) in SEED_CHAPTERS {
        session.add(Chapter::new(0, *title, *text));
    }

    let report = session.save_changes_with(|tx, added| {
        let user_id = SqliteUserRepository::new(tx).create_user(&User::new(SEED_USER))?;
        for chapter in added.iter_mut() {
            chapter.user_id = user_id;
        }
        Ok(())
    })?;
    info!(
        "event=db_seed module=service status=ok chapters={} indexed={}",
        report.rows_written, report.fts.indexed
    );
    Ok(Some(report))
}

/// Migrations run when the context opens; this adds the seed data.
pub fn init_db(ctx: &mut AppContext) -> ServiceResult<Option<SaveReport>> {
    ctx.run_in_session(seed_if_empty)
}

/// Appends [`MODIFIED_SUFFIX`] to the first chapter's title.
pub fn touch_first_chapter(ctx: &mut AppContext) -> ServiceResult<Chapter> {
    ctx.run_in_session(|session| {
        let key = session.first()?.ok_or(ServiceError::NoChapters)?;
        if let Some(chapter) = session.get_mut(key) {
            chapter.title.push_str(MODIFIED_SUFFIX);
        }
        session.save_changes()?;
        session.get(key).cloned().ok_or(ServiceError::NoChapters)
    })
}

/// Deletes the first chapter and returns it as it was stored.
pub fn remove_first_chapter(ctx: &mut AppContext) -> ServiceResult<Chapter> {
    ctx.run_in_session(|session| {
        let key = session.first()?.ok_or(ServiceError::NoChapters)?;
        let removed = session.get(key).cloned().ok_or(ServiceError::NoChapters)?;
        session.remove(key)?;
        session.save_changes()?;
        Ok(removed)
    })
}
