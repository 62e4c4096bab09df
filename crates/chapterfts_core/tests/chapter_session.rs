use chapterfts_core::db::open_db_in_memory;
use chapterfts_core::{
    Chapter, ChapterRepository, ChapterSession, EntryState, RepoError, SqliteChapterRepository,
    SqliteUserRepository, User, UserId, UserRepository,
};
use rusqlite::Connection;

#[test]
fn save_assigns_ids_and_accepts_added_entries() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn, "author");
    let mut session = ChapterSession::new(&mut conn);

    let first = session.add(Chapter::new(user_id, "One", "first body"));
    let second = session.add(Chapter::new(user_id, "Two", "second body"));
    assert_eq!(session.state(first), Some(EntryState::Added));
    assert!(session.has_changes());

    let report = session.save_changes().unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.fts.indexed, 2);

    let first_id = session.get(first).unwrap().id;
    let second_id = session.get(second).unwrap().id;
    assert!(first_id > 0);
    assert!(second_id > first_id);
    assert_eq!(session.state(first), Some(EntryState::Unchanged));
    assert!(!session.has_changes());

    let stored = SqliteChapterRepository::new(session.connection())
        .get_chapter(second_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "Two");
    assert_eq!(stored.user_id, user_id);
}

#[test]
fn find_tracks_each_chapter_once() {
    let mut conn = open_db_in_memory().unwrap();
    let id = insert_saved(&mut conn, "Title", "Body");
    let mut session = ChapterSession::new(&mut conn);

    let key = session.find(id).unwrap().unwrap();
    assert_eq!(session.find(id).unwrap(), Some(key));
    assert_eq!(session.first().unwrap(), Some(key));
    assert_eq!(session.state(key), Some(EntryState::Unchanged));
    assert_eq!(session.find(id + 100).unwrap(), None);
}

#[test]
fn in_place_edits_are_detected_and_reverted_edits_are_not() {
    let mut conn = open_db_in_memory().unwrap();
    let id = insert_saved(&mut conn, "Title", "Body");
    let mut session = ChapterSession::new(&mut conn);
    let key = session.find(id).unwrap().unwrap();

    session.get_mut(key).unwrap().title = "Renamed".to_string();
    assert_eq!(session.state(key), Some(EntryState::Modified));

    let changes = session.changed_entries();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].state, EntryState::Modified);
    assert_eq!(changes[0].original.title, "Title");
    assert_eq!(changes[0].current.title, "Renamed");

    session.get_mut(key).unwrap().title = "Title".to_string();
    assert_eq!(session.state(key), Some(EntryState::Unchanged));
    assert!(session.changed_entries().is_empty());
    assert_eq!(session.save_changes().unwrap().rows_written, 0);
}

#[test]
fn saving_modification_updates_row_and_resets_original() {
    let mut conn = open_db_in_memory().unwrap();
    let id = insert_saved(&mut conn, "Title", "Body");
    let mut session = ChapterSession::new(&mut conn);
    let key = session.find(id).unwrap().unwrap();

    session.get_mut(key).unwrap().text = "New body".to_string();
    let report = session.save_changes().unwrap();
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.fts.removed, 1);
    assert_eq!(report.fts.indexed, 1);
    assert_eq!(session.state(key), Some(EntryState::Unchanged));

    let stored = SqliteChapterRepository::new(session.connection())
        .get_chapter(id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.text, "New body");
}

#[test]
fn removing_added_entry_detaches_it() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn, "author");
    let mut session = ChapterSession::new(&mut conn);

    let key = session.add(Chapter::new(user_id, "Draft", "never saved"));
    session.remove(key).unwrap();

    assert_eq!(session.get(key), None);
    assert!(!session.has_changes());
    assert_eq!(session.save_changes().unwrap().rows_written, 0);
    assert!(matches!(session.remove(key), Err(RepoError::InvalidData(_))));
}

#[test]
fn removing_persisted_entry_deletes_row_on_save() {
    let mut conn = open_db_in_memory().unwrap();
    let id = insert_saved(&mut conn, "Title", "Body");
    let mut session = ChapterSession::new(&mut conn);
    let key = session.find(id).unwrap().unwrap();

    session.remove(key).unwrap();
    assert_eq!(session.state(key), Some(EntryState::Deleted));

    let report = session.save_changes().unwrap();
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.fts.removed, 1);
    assert_eq!(session.get(key), None);

    let repo = SqliteChapterRepository::new(session.connection());
    assert_eq!(repo.get_chapter(id).unwrap(), None);
    assert_eq!(repo.count_chapters().unwrap(), 0);
}

#[test]
fn failed_save_rolls_back_and_keeps_pending_state() {
    let mut conn = open_db_in_memory().unwrap();
    let user_id = create_user(&conn, "author");
    let mut session = ChapterSession::new(&mut conn);

    let valid = session.add(Chapter::new(user_id, "Valid", "valid body"));
    let orphan = session.add(Chapter::new(user_id + 999, "Orphan", "no such author"));

    let err = session.save_changes().unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "unexpected error: {err}");

    assert_eq!(session.state(valid), Some(EntryState::Added));
    assert_eq!(session.state(orphan), Some(EntryState::Added));
    assert_eq!(session.get(valid).unwrap().id, 0);
    assert_eq!(
        SqliteChapterRepository::new(session.connection())
            .count_chapters()
            .unwrap(),
        0
    );

    session.remove(orphan).unwrap();
    let report = session.save_changes().unwrap();
    assert_eq!(report.rows_written, 1);
    assert!(session.get(valid).unwrap().is_persisted());
}

#[test]
fn pre_write_hook_shares_the_save_transaction() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(0, "Seeded", "author assigned on save"));

    let report = session
        .save_changes_with(|tx, added| {
            assert_eq!(added.len(), 1);
            let user_id = SqliteUserRepository::new(tx).create_user(&User::new("hooked"))?;
            added[0].user_id = user_id;
            Ok(())
        })
        .unwrap();
    assert_eq!(report.rows_written, 1);

    let chapter = session.get(key).unwrap().clone();
    let author = SqliteUserRepository::new(session.connection())
        .get_user(chapter.user_id)
        .unwrap()
        .unwrap();
    assert_eq!(author.name, "hooked");
}

#[test]
fn failed_save_undoes_hook_rows_and_edits() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = ChapterSession::new(&mut conn);
    let key = session.add(Chapter::new(0, "Draft", "body"));

    let err = session
        .save_changes_with(|tx, added| {
            SqliteUserRepository::new(tx).create_user(&User::new("rolled back"))?;
            added[0].user_id = 999;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "unexpected error: {err}");

    assert_eq!(session.get(key).unwrap().user_id, 0);
    assert_eq!(session.state(key), Some(EntryState::Added));
    let users: i64 = session
        .connection()
        .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 0);
}

#[test]
fn save_rejects_chapters_without_author() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = ChapterSession::new(&mut conn);
    session.add(Chapter::new(0, "Nobody", "body"));

    let err = session.save_changes().unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)), "unexpected error: {err}");
}

fn create_user(conn: &Connection, name: &str) -> UserId {
    SqliteUserRepository::new(conn)
        .create_user(&User::new(name))
        .unwrap()
}

fn insert_saved(conn: &mut Connection, title: &str, text: &str) -> i64 {
    let user_id = create_user(conn, "author");
    let mut session = ChapterSession::new(conn);
    let key = session.add(Chapter::new(user_id, title, text));
    session.save_changes().unwrap();
    session.get(key).unwrap().id
}
