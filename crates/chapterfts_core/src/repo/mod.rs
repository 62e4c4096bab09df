//! Repository layer and change tracking.
//!
//! # Responsibility
//! - Define read contracts over `users`/`chapters`.
//! - Own the unit of work that writes chapters and keeps `chapters_fts` in step.
//!
//! # Invariants
//! - Chapter writes go through [`session::ChapterSession`]; writing `chapters`
//!   any other way leaves the full-text index stale.

pub mod chapter_repo;
pub mod session;
pub mod user_repo;
