//! Keepsake Storage Layer
//!
//! SQLite-backed key/value partitions. Each partition is one opaque
//! JSON document addressed by a top-level key; the snapshot store is
//! the only writer.

mod database;
mod error;
mod migrations;

pub use database::{Database, Persistence};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
