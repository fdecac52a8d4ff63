//! Keepsake Database Scanner
//!
//! Enumerates the embedded SQLite databases of an execution context and
//! drills into their collections, indexes and record counts.
//!
//! The scanner runs on its own worker thread and is reachable only
//! through a request/response channel. Every request carries a
//! correlation id and yields exactly one response. Each operation opens
//! its own connection and closes it before replying, so the scanner never
//! holds a handle that could block a delete.

mod client;
mod error;
mod host;
mod introspect;
mod protocol;
mod worker;

pub use client::ScannerClient;
pub use error::ScannerError;
pub use host::{DatabaseConnection, DatabaseHost};
pub use introspect::{CollectionInfo, DatabaseInfo, IndexInfo, KeyPath, ESTIMATED_RECORD_SIZE};
pub use protocol::{ScanOperation, ScanRequest, ScanResponse, DEFAULT_SAMPLE_LIMIT};
pub use worker::{spawn_worker, ScanWorker};

pub type Result<T> = std::result::Result<T, ScannerError>;
