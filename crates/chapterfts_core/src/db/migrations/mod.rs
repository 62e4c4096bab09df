//! Schema steps for the chapters database.
//!
//! Each step is one SQL script; `PRAGMA user_version` records the last step
//! applied. Pending steps run together in a single transaction.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// One schema step.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    script: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "users_and_chapters",
        script: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "chapters_fts",
        script: include_str!("0002_chapters_fts.sql"),
    },
];

/// Highest schema version this build can produce.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Brings the schema up to [`latest_version`] and returns the versions applied.
///
/// Refuses databases written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > found)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    let mut applied = Vec::with_capacity(pending.len());
    for step in pending {
        tx.execute_batch(step.script)?;
        tx.pragma_update(None, "user_version", step.version)?;
        applied.push(step.version);
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    Ok(applied)
}
