//! Chapter author entity.

use serde::{Deserialize, Serialize};

/// Rowid of a `users` row.
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    /// Creates an unsaved user; `id` is assigned on insert.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }
}
