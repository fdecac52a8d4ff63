//! Snapshot store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Storage error: {0}")]
    Storage(#[from] keepsake_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile name cannot be empty")]
    EmptyName,

    #[error("Domain cannot be empty")]
    EmptyDomain,

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}
