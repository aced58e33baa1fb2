//! Core operations for running amateur padel tournaments: pair
//! registration, deterministic schedule generation (a 4-pair round robin or
//! an 8-pair knockout bracket), score recording with winner propagation
//! between knockout rounds, and consolidation of completed results into
//! persistent rankings.
//!
//! All state lives in the database. Every public operation runs as a single
//! transaction over the provided connection, so operations either apply in
//! full or not at all.

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub mod error;
pub mod schema;
pub mod tournaments;

#[cfg(test)]
mod test;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
