//! Router error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("No active page")]
    NoActivePage,

    #[error("Invalid page URL: {0}")]
    InvalidPage(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] keepsake_snapshot::SnapshotError),

    #[error("Scanner error: {0}")]
    Scanner(#[from] keepsake_scanner::ScannerError),

    #[error("Request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
