//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] keepsake_storage::StorageError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] keepsake_snapshot::SnapshotError),

    #[error("Scanner error: {0}")]
    Scanner(#[from] keepsake_scanner::ScannerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
