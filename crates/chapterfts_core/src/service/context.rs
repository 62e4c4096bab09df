//! Application context: settings → connection → sessions.
//!
//! # Responsibility
//! - Open the configured database once and hand out chapter sessions.
//! - Give callers one error type spanning config, storage and search failures.

use crate::config::{AppSettings, ConfigError, DatabaseTarget};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::repo::chapter_repo::RepoError;
use crate::repo::session::ChapterSession;
use crate::search::SearchError;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
    Search(SearchError),
    /// Operation needs a chapter but the table is empty.
    NoChapters,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::NoChapters => write!(f, "no chapters in database"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::NoChapters => None,
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SearchError> for ServiceError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Owns the migrated connection for one process or test.
pub struct AppContext {
    conn: Connection,
}

impl AppContext {
    /// Opens the database named by `settings`, resolving placeholders
    /// against `content_root`.
    pub fn open(settings: &AppSettings, content_root: &Path) -> ServiceResult<Self> {
        let conn = match settings.connection_target(content_root) {
            DatabaseTarget::Memory => open_db_in_memory()?,
            DatabaseTarget::File(path) => {
                info!(
                    "event=context_open module=service status=start path={}",
                    path.display()
                );
                open_db(path)?
            }
        };
        Ok(Self { conn })
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Starts a fresh change-tracking session.
    pub fn session(&mut self) -> ChapterSession<'_> {
        ChapterSession::new(&mut self.conn)
    }

    /// Runs `action` with a fresh session that is dropped afterwards.
    ///
    /// Unsaved changes are discarded with the session.
    pub fn run_in_session<T>(
        &mut self,
        action: impl FnOnce(&mut ChapterSession<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut session = self.session();
        action(&mut session)
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}
