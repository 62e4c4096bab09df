//! Use-case services.
//!
//! # Responsibility
//! - Wire settings, connection and sessions together (`context`).
//! - Provide initialization and the scripted edit scenarios (`seed`).

pub mod context;
pub mod seed;
