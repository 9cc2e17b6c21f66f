//! # jobkeeper Store
//!
//! Store implementations for the jobkeeper scheduling engine: a
//! SQLite-backed store for production and in-memory stores for tests and
//! lightweight embedding.

mod memory;
mod schema;
mod sqlite;

pub use memory::{MemoryExecutionStore, MemoryJobStore};
pub use sqlite::SqliteStore;
