//! Entities and keyless query projections.
//!
//! # Responsibility
//! - Define the `User`/`Chapter` rows persisted in the primary tables.
//! - Define read-only rows produced by full-text and spell-correction queries.
//!
//! # Invariants
//! - Entity ids are SQLite rowids; `0` means "not persisted yet".
//! - Projection rows carry no identity of their own and are never written back.

pub mod chapter;
pub mod projection;
pub mod user;
