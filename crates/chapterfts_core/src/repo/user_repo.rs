//! User repository.

use super::chapter_repo::{RepoError, RepoResult};
use crate::model::user::{User, UserId};
use rusqlite::{Connection, OptionalExtension};

pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        if user.name.trim().is_empty() {
            return Err(RepoError::InvalidData("user name cannot be blank".to_string()));
        }

        self.conn
            .execute("INSERT INTO users (name) VALUES (?1);", [user.name.as_str()])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row("SELECT id, name FROM users WHERE id = ?1;", [id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;
        Ok(user)
    }
}
