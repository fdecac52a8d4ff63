//! Scanner error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Database not found: {0}")]
    NotFound(String),

    #[error("Collection not found: {database}/{collection}")]
    CollectionNotFound { database: String, collection: String },

    #[error("Database {0} is blocked by an open connection")]
    Blocked(String),

    #[error("Invalid database name: {0}")]
    InvalidName(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate request id: {0}")]
    DuplicateRequest(String),

    #[error("Scanner channel closed")]
    ChannelClosed,

    #[error("Scan failed: {0}")]
    Failed(String),
}
