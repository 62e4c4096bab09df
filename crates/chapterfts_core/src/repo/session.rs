//! Change-tracking unit of work for chapters.
//!
//! # Responsibility
//! - Remember the original values of every chapter loaded or added.
//! - Derive `Added`/`Modified`/`Deleted` entries from in-place edits.
//! - Persist primary writes and full-text index updates in one transaction.
//!
//! # Invariants
//! - Changed entries are collected before the primary writes run, so the
//!   index sees the values that were indexed before this save.
//! - Tracked state is accepted only after a successful commit; a failed save
//!   leaves every entry exactly as it was.

use super::chapter_repo::{
    delete_chapter, insert_chapter, load_chapter, update_chapter, RepoError, RepoResult,
};
use crate::model::chapter::{Chapter, ChapterId};
use crate::search::sync::{update_chapter_fts, FtsSyncReport};
use log::{error, info};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::time::Instant;

/// Lifecycle state of a tracked chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

/// Handle to a chapter tracked by a [`ChapterSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey(usize);

/// A pending change: current values plus the values last persisted.
///
/// For `Added` entries `original` equals `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedChapter {
    pub state: EntryState,
    pub current: Chapter,
    pub original: Chapter,
}

/// Result of [`ChapterSession::save_changes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Primary rows inserted, updated or deleted.
    pub rows_written: usize,
    pub fts: FtsSyncReport,
}

#[derive(Debug)]
struct TrackedEntry {
    state: EntryState,
    current: Chapter,
    original: Chapter,
}

/// Unit of work over one connection.
///
/// Meant to be short-lived: detached entries keep their slot until the session
/// is dropped, and lookups by id scan every tracked entry.
pub struct ChapterSession<'conn> {
    conn: &'conn mut Connection,
    entries: Vec<Option<TrackedEntry>>,
}

impl<'conn> ChapterSession<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self {
            conn,
            entries: Vec::new(),
        }
    }

    /// Read access for queries issued alongside tracked edits.
    pub fn connection(&self) -> &Connection {
        &*self.conn
    }

    /// Starts tracking a new chapter; it is inserted on the next save.
    pub fn add(&mut self, chapter: Chapter) -> EntryKey {
        self.track(EntryState::Added, chapter)
    }

    /// Loads a chapter by id and tracks it as `Unchanged`.
    ///
    /// Returns the existing handle when the chapter is already tracked.
    pub fn find(&mut self, id: ChapterId) -> RepoResult<Option<EntryKey>> {
        if let Some(key) = self.key_of(id) {
            return Ok(Some(key));
        }
        Ok(load_chapter(&*self.conn, id)?.map(|chapter| self.track(EntryState::Unchanged, chapter)))
    }

    /// Loads the lowest-id chapter and tracks it.
    pub fn first(&mut self) -> RepoResult<Option<EntryKey>> {
        let first_id: Option<ChapterId> = self
            .conn
            .query_row("SELECT id FROM chapters ORDER BY id ASC LIMIT 1;", [], |row| {
                row.get(0)
            })
            .optional()?;
        match first_id {
            Some(id) => self.find(id),
            None => Ok(None),
        }
    }

    pub fn get(&self, key: EntryKey) -> Option<&Chapter> {
        self.entry(key).map(|entry| &entry.current)
    }

    /// Mutable access to the current values; edits are picked up by
    /// [`detect_changes`](Self::detect_changes).
    pub fn get_mut(&mut self, key: EntryKey) -> Option<&mut Chapter> {
        self.entries
            .get_mut(key.0)
            .and_then(Option::as_mut)
            .map(|entry| &mut entry.current)
    }

    /// Effective state of an entry, including undetected edits.
    pub fn state(&self, key: EntryKey) -> Option<EntryState> {
        self.entry(key).map(effective_state)
    }

    /// Marks an entry for deletion. Entries never saved are simply detached.
    pub fn remove(&mut self, key: EntryKey) -> RepoResult<()> {
        let slot = self
            .entries
            .get_mut(key.0)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown session entry {}", key.0)))?;
        let state = match slot.as_ref() {
            Some(entry) => entry.state,
            None => {
                return Err(RepoError::InvalidData(format!(
                    "session entry {} is detached",
                    key.0
                )))
            }
        };
        if state == EntryState::Added {
            *slot = None;
        } else if let Some(entry) = slot.as_mut() {
            entry.state = EntryState::Deleted;
        }
        Ok(())
    }

    /// Promotes edited `Unchanged` entries to `Modified`.
    pub fn detect_changes(&mut self) {
        for entry in self.entries.iter_mut().flatten() {
            entry.state = effective_state(entry);
        }
    }

    /// Lists every pending change in tracking order.
    pub fn changed_entries(&mut self) -> Vec<ChangedChapter> {
        self.detect_changes();
        self.entries
            .iter()
            .flatten()
            .filter(|entry| entry.state != EntryState::Unchanged)
            .map(|entry| ChangedChapter {
                state: entry.state,
                current: entry.current.clone(),
                original: if entry.state == EntryState::Added {
                    entry.current.clone()
                } else {
                    entry.original.clone()
                },
            })
            .collect()
    }

    pub fn has_changes(&mut self) -> bool {
        self.detect_changes();
        self.entries
            .iter()
            .flatten()
            .any(|entry| entry.state != EntryState::Unchanged)
    }

    /// Writes pending changes and updates `chapters_fts` in one transaction.
    pub fn save_changes(&mut self) -> RepoResult<SaveReport> {
        self.save_changes_with(|_, _| Ok(()))
    }

    /// Same as [`save_changes`](Self::save_changes), but first runs
    /// `before_writes` on the save transaction with the current values of every
    /// pending `Added` chapter. Rows it writes commit or roll back together with
    /// the chapters; its edits to the chapters are undone when the save fails.
    pub fn save_changes_with<F>(&mut self, before_writes: F) -> RepoResult<SaveReport>
    where
        F: FnOnce(&Connection, &mut [&mut Chapter]) -> RepoResult<()>,
    {
        self.detect_changes();
        let pending = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|entry| entry.state != EntryState::Unchanged)
                    .map(|_| index)
            })
            .collect::<Vec<_>>();

        if pending.is_empty() {
            return Ok(SaveReport::default());
        }

        let added_before = pending
            .iter()
            .filter_map(|&index| {
                self.entries[index]
                    .as_ref()
                    .filter(|entry| entry.state == EntryState::Added)
                    .map(|entry| (index, entry.current.clone()))
            })
            .collect::<Vec<_>>();

        let started_at = Instant::now();
        let result = self.write_pending(&pending, before_writes);
        match &result {
            Ok((report, _)) => info!(
                "event=save_changes module=repo status=ok rows={} indexed={} removed={} skipped={} duration_ms={}",
                report.rows_written,
                report.fts.indexed,
                report.fts.removed,
                report.fts.skipped,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=save_changes module=repo status=error pending={} duration_ms={} error={err}",
                pending.len(),
                started_at.elapsed().as_millis()
            ),
        }

        if result.is_err() {
            for (index, chapter) in added_before {
                if let Some(entry) = self.entries[index].as_mut() {
                    entry.current = chapter;
                }
            }
        }

        let (report, assigned_ids) = result?;
        self.accept_changes(&pending, &assigned_ids);
        Ok(report)
    }

    fn write_pending<F>(
        &mut self,
        pending: &[usize],
        before_writes: F,
    ) -> RepoResult<(SaveReport, Vec<(usize, ChapterId)>)>
    where
        F: FnOnce(&Connection, &mut [&mut Chapter]) -> RepoResult<()>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        {
            let mut added = self
                .entries
                .iter_mut()
                .enumerate()
                .filter(|(index, _)| pending.binary_search(index).is_ok())
                .filter_map(|(_, slot)| slot.as_mut())
                .filter(|entry| entry.state == EntryState::Added)
                .map(|entry| &mut entry.current)
                .collect::<Vec<_>>();
            before_writes(&*tx, added.as_mut_slice())?;
        }
        let mut changes = Vec::with_capacity(pending.len());
        let mut assigned_ids = Vec::new();

        for &index in pending {
            let Some(entry) = self.entries[index].as_ref() else {
                continue;
            };

            match entry.state {
                EntryState::Added => {
                    let id = insert_chapter(&tx, &entry.current)?;
                    let mut current = entry.current.clone();
                    current.id = id;
                    assigned_ids.push((index, id));
                    changes.push(ChangedChapter {
                        state: EntryState::Added,
                        current: current.clone(),
                        original: current,
                    });
                }
                EntryState::Modified => {
                    if entry.current.id != entry.original.id {
                        return Err(RepoError::InvalidData(format!(
                            "chapter id changed from {} to {}",
                            entry.original.id, entry.current.id
                        )));
                    }
                    update_chapter(&tx, &entry.current)?;
                    changes.push(ChangedChapter {
                        state: EntryState::Modified,
                        current: entry.current.clone(),
                        original: entry.original.clone(),
                    });
                }
                EntryState::Deleted => {
                    delete_chapter(&tx, entry.original.id)?;
                    changes.push(ChangedChapter {
                        state: EntryState::Deleted,
                        current: entry.current.clone(),
                        original: entry.original.clone(),
                    });
                }
                EntryState::Unchanged => {}
            }
        }

        let fts = update_chapter_fts(&tx, &changes)?;
        tx.commit()?;

        Ok((
            SaveReport {
                rows_written: changes.len(),
                fts,
            },
            assigned_ids,
        ))
    }

    fn accept_changes(&mut self, pending: &[usize], assigned_ids: &[(usize, ChapterId)]) {
        for &(index, id) in assigned_ids {
            if let Some(entry) = self.entries[index].as_mut() {
                entry.current.id = id;
            }
        }

        for &index in pending {
            let slot = &mut self.entries[index];
            let deleted = slot
                .as_ref()
                .is_some_and(|entry| entry.state == EntryState::Deleted);
            if deleted {
                *slot = None;
            } else if let Some(entry) = slot.as_mut() {
                entry.state = EntryState::Unchanged;
                entry.original = entry.current.clone();
            }
        }
    }

    fn track(&mut self, state: EntryState, chapter: Chapter) -> EntryKey {
        self.entries.push(Some(TrackedEntry {
            state,
            original: chapter.clone(),
            current: chapter,
        }));
        EntryKey(self.entries.len() - 1)
    }

    fn key_of(&self, id: ChapterId) -> Option<EntryKey> {
        self.entries
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .is_some_and(|entry| entry.state != EntryState::Added && entry.original.id == id)
            })
            .map(EntryKey)
    }

    fn entry(&self, key: EntryKey) -> Option<&TrackedEntry> {
        self.entries.get(key.0).and_then(Option::as_ref)
    }
}

fn effective_state(entry: &TrackedEntry) -> EntryState {
    match entry.state {
        EntryState::Unchanged if entry.current != entry.original => EntryState::Modified,
        EntryState::Modified if entry.current == entry.original => EntryState::Unchanged,
        state => state,
    }
}
