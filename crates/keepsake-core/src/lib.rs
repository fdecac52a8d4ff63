//! Keepsake Core
//!
//! Wires the snapshot store, database scanner and request router into
//! one state container, and owns configuration and logging setup.

mod config;
mod error;
mod keepsake;

pub use config::Config;
pub use error::CoreError;
pub use keepsake::Keepsake;

// Re-export core components
pub use keepsake_router::{
    MemoryPages, OperationKind, PageCollector, PageTarget, Request, Response, Router, RouterError,
    StorageArea,
};
pub use keepsake_scanner::{
    CollectionInfo, DatabaseHost, DatabaseInfo, IndexInfo, KeyPath, ScannerClient, ScannerError,
};
pub use keepsake_snapshot::{
    Cookie, CookieAccount, ExportBundle, Profile, SnapshotError, SnapshotStore, StorageBackup,
};
pub use keepsake_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
///
/// Output goes to stderr; stdout may be carrying protocol frames.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
