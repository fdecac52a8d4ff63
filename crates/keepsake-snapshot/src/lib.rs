//! Keepsake Snapshot Store
//!
//! Durable registry of three record kinds:
//! - Profiles: named opaque payloads, last write wins
//! - Storage backups: per-domain copies of key/value storage
//! - Cookie accounts: per-domain copies of a cookie set
//!
//! Backups and accounts are partitioned by domain and receive generated
//! identifiers that never collide within a domain.

mod domain;
mod error;
mod export;
mod id;
mod record;
mod store;

pub use domain::normalize_domain;
pub use error::SnapshotError;
pub use export::ExportBundle;
pub use id::{IdGenerator, RecordKind};
pub use record::{
    AccountInfo, BackupInfo, Cookie, CookieAccount, Profile, StorageBackup, StorageData,
};
pub use store::{SnapshotStore, ACCOUNTS_PARTITION, BACKUPS_PARTITION, PROFILES_PARTITION};

pub type Result<T> = std::result::Result<T, SnapshotError>;
