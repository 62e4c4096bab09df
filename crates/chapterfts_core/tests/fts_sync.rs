use chapterfts_core::db::open_db_in_memory;
use chapterfts_core::{
    rebuild_chapter_fts, search_chapters, update_chapter_fts, ChangedChapter, Chapter,
    ChapterSearch, ChapterSession, EntryState, SqliteUserRepository, User, UserId, UserRepository,
};
use rusqlite::Connection;

const MARKUP_TEXT: &str = "<p>Isn't this <font face=\"Comic Sans\">funny</font>?";

#[test]
fn added_chapter_becomes_searchable() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(user_id, "Zebra crossings", "Stripes on the road"));
    session.save_changes().unwrap();
    let id = session.get(key).unwrap().id;
    drop(session);

    assert_eq!(matching_ids(&conn, "zebra"), vec![id]);
    assert_eq!(matching_ids(&conn, "stripes"), vec![id]);
    assert_eq!(matching_ids(&conn, "title:road"), Vec::<i64>::new());
}

#[test]
fn modified_title_replaces_old_terms() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(user_id, "Original heading", "Shared body"));
    session.save_changes().unwrap();

    session.get_mut(key).unwrap().title = "Replacement heading".to_string();
    let report = session.save_changes().unwrap();
    assert_eq!(report.fts.removed, 1);
    assert_eq!(report.fts.indexed, 1);
    let id = session.get(key).unwrap().id;
    drop(session);

    assert!(matching_ids(&conn, "original").is_empty());
    assert_eq!(matching_ids(&conn, "replacement"), vec![id]);
    assert_eq!(matching_ids(&conn, "heading"), vec![id]);
    assert!(!vocabulary_contains(&conn, "original"));
}

#[test]
fn modification_outside_indexed_columns_is_skipped() {
    let mut conn = open_db_in_memory().unwrap();
    let first_user = create_user(&conn);
    let second_user = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(first_user, "Owned", "Body"));
    session.save_changes().unwrap();

    session.get_mut(key).unwrap().user_id = second_user;
    let report = session.save_changes().unwrap();
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.fts.skipped, 1);
    assert!(!report.fts.index_changed());
    assert_eq!(report.fts.vocabulary, None);
}

#[test]
fn deleting_chapter_removes_every_index_term() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let plain = session.add(Chapter::new(user_id, "Plain", "Nothing special here"));
    let markup = session.add(Chapter::new(user_id, "Markup", MARKUP_TEXT));
    session.save_changes().unwrap();

    session.remove(plain).unwrap();
    session.remove(markup).unwrap();
    let report = session.save_changes().unwrap();
    assert_eq!(report.fts.removed, 2);
    drop(session);

    assert!(matching_ids(&conn, "special").is_empty());
    assert!(matching_ids(&conn, "funny").is_empty());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM chapters_fts_vocab;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM chapters_fts_spellfix;"), 0);
}

#[test]
fn markup_is_stripped_before_indexing() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(user_id, "Handle markup in text", MARKUP_TEXT));
    session.save_changes().unwrap();
    let id = session.get(key).unwrap().id;
    drop(session);

    assert_eq!(matching_ids(&conn, "funny"), vec![id]);
    assert!(matching_ids(&conn, "font").is_empty());
    assert!(matching_ids(&conn, "comic").is_empty());
    assert!(vocabulary_contains(&conn, "funny"));
    assert!(!vocabulary_contains(&conn, "face"));
}

#[test]
fn editing_markup_chapter_keeps_index_consistent() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(user_id, "Markup", MARKUP_TEXT));
    session.save_changes().unwrap();

    session.get_mut(key).unwrap().text = "<em>serious</em> now".to_string();
    session.save_changes().unwrap();
    let id = session.get(key).unwrap().id;
    drop(session);

    assert!(matching_ids(&conn, "funny").is_empty());
    assert_eq!(matching_ids(&conn, "serious"), vec![id]);
    assert!(matching_ids(&conn, "em").is_empty());
}

#[test]
fn failed_save_leaves_index_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    session.add(Chapter::new(user_id, "Committed", "never"));
    session.add(Chapter::new(user_id + 999, "Orphan", "dangling"));

    assert!(session.save_changes().is_err());
    drop(session);

    assert!(matching_ids(&conn, "committed").is_empty());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM chapters_fts_vocab;"), 0);
}

#[test]
fn unchanged_changes_are_reported_as_skipped() {
    let conn = open_db_in_memory().unwrap();
    let chapter = Chapter {
        id: 1,
        title: "Same".to_string(),
        text: "Same".to_string(),
        user_id: 1,
    };
    let changes = [
        ChangedChapter {
            state: EntryState::Unchanged,
            current: chapter.clone(),
            original: chapter.clone(),
        },
        ChangedChapter {
            state: EntryState::Modified,
            current: chapter.clone(),
            original: chapter,
        },
    ];

    let report = update_chapter_fts(&conn, &changes).unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.indexed, 0);
    assert_eq!(report.vocabulary, None);
}

#[test]
fn rebuild_reindexes_normalized_chapters() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn);
    let mut session = ChapterSession::new(&mut conn);
    session.add(Chapter::new(user_id, "First", "alpha"));
    let markup = session.add(Chapter::new(user_id, "Second", MARKUP_TEXT));
    session.save_changes().unwrap();
    let markup_id = session.get(markup).unwrap().id;
    drop(session);

    let report = rebuild_chapter_fts(&mut conn).unwrap();
    assert_eq!(report.indexed, 2);
    assert!(report.vocabulary.is_some());

    assert_eq!(matching_ids(&conn, "funny"), vec![markup_id]);
    assert!(matching_ids(&conn, "font").is_empty());
    assert_eq!(matching_ids(&conn, "alpha").len(), 1);

    // A delete after rebuild must still find the exact indexed values.
    let mut session = ChapterSession::new(&mut conn);
    let key = session.find(markup_id).unwrap().unwrap();
    session.remove(key).unwrap();
    session.save_changes().unwrap();
    drop(session);
    assert!(!vocabulary_contains(&conn, "funny"));
}

fn create_user(conn: &Connection) -> UserId {
    SqliteUserRepository::new(conn)
        .create_user(&User::new("author"))
        .unwrap()
}

fn matching_ids(conn: &Connection, expression: &str) -> Vec<i64> {
    search_chapters(conn, &ChapterSearch::new(expression))
        .unwrap()
        .into_iter()
        .map(|hit| hit.rowid)
        .collect()
}

fn vocabulary_contains(conn: &Connection, term: &str) -> bool {
    let found: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM chapters_fts_vocab WHERE term = ?1);",
            [term],
            |row| row.get(0),
        )
        .unwrap();
    found == 1
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
