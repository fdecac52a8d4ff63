//! Database host
//!
//! The set of embedded databases reachable from one execution context:
//! one SQLite file per database under a root directory. The host keeps a
//! registry of open connections so that deleting a database someone is
//! still using fails instead of pulling the file out from under them.

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ScannerError;
use crate::Result;

const DATABASE_EXTENSIONS: [&str; 3] = ["sqlite", "sqlite3", "db"];
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

type Registry = Arc<Mutex<HashMap<String, usize>>>;

pub struct DatabaseHost {
    root: PathBuf,
    /// Whether this context supports listing all of its databases
    enumerate: bool,
    /// Open connection count per database name
    open: Registry,
}

impl DatabaseHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            enumerate: true,
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_enumeration(mut self, enabled: bool) -> Self {
        self.enumerate = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all databases, or `None` when this context cannot
    /// enumerate them.
    pub fn database_names(&self) -> Result<Option<Vec<String>>> {
        if !self.enumerate {
            return Ok(None);
        }
        if !self.root.is_dir() {
            return Ok(Some(Vec::new()));
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_database = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DATABASE_EXTENSIONS.contains(&ext));
            if !is_database {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        names.dedup();
        Ok(Some(names))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.existing_path(name).is_some()
    }

    /// Open an existing database at its current version.
    pub fn open(&self, name: &str) -> Result<DatabaseConnection> {
        validate_name(name)?;

        // Registered before the file is touched so a concurrent delete
        // sees the connection as soon as it can race with it
        let lease = self.reserve(name);
        let path = self
            .existing_path(name)
            .ok_or_else(|| ScannerError::NotFound(name.to_string()))?;

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(DatabaseConnection { conn, lease })
    }

    /// Open `name`, creating an empty database if it does not exist yet.
    pub fn create(&self, name: &str) -> Result<DatabaseConnection> {
        validate_name(name)?;
        std::fs::create_dir_all(&self.root)?;

        let lease = self.reserve(name);
        let path = match self.existing_path(name) {
            Some(path) => path,
            None => {
                let path = self.root.join(format!("{name}.{}", DATABASE_EXTENSIONS[0]));
                // An empty file is a valid empty database
                std::fs::File::create(&path)?;
                path
            }
        };
        let conn = Connection::open(&path)?;
        Ok(DatabaseConnection { conn, lease })
    }

    /// Remove a database and its sidecar files.
    ///
    /// Fails with [`ScannerError::Blocked`] while any connection to it is
    /// open; the caller decides whether to try again later.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        // Held across the removal so no connection can open mid-delete
        let open = self.open.lock();
        if open.get(name).copied().unwrap_or(0) > 0 {
            return Err(ScannerError::Blocked(name.to_string()));
        }

        let path = self
            .existing_path(name)
            .ok_or_else(|| ScannerError::NotFound(name.to_string()))?;
        std::fs::remove_file(&path)?;

        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }

        tracing::info!(database = %name, "Deleted database");

        Ok(())
    }

    /// Number of connections currently open to `name`.
    pub fn open_connections(&self, name: &str) -> usize {
        self.open.lock().get(name).copied().unwrap_or(0)
    }

    fn existing_path(&self, name: &str) -> Option<PathBuf> {
        DATABASE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Count one connection against `name`. Dropping the lease undoes it,
    /// including when the open that follows fails.
    fn reserve(&self, name: &str) -> Lease {
        *self.open.lock().entry(name.to_string()).or_insert(0) += 1;

        Lease {
            name: name.to_string(),
            registry: Arc::clone(&self.open),
        }
    }
}

impl Clone for DatabaseHost {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            enumerate: self.enumerate,
            open: Arc::clone(&self.open),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(ScannerError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// An open connection registered with its host.
///
/// The SQLite handle is closed before the registration is released.
pub struct DatabaseConnection {
    conn: Connection,
    lease: Lease,
}

impl DatabaseConnection {
    pub fn name(&self) -> &str {
        &self.lease.name
    }
}

impl Deref for DatabaseConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

struct Lease {
    name: String,
    registry: Registry,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut open = self.registry.lock();
        if let Some(count) = open.get_mut(&self.name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                open.remove(&self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerates_database_files() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());

        host.create("notes").unwrap();
        host.create("cache").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();

        assert_eq!(
            host.database_names().unwrap(),
            Some(vec!["cache".to_string(), "notes".to_string()])
        );
    }

    #[test]
    fn test_missing_root_has_no_databases() {
        let host = DatabaseHost::new("/nonexistent/keepsake/databases");
        assert_eq!(host.database_names().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_enumeration_can_be_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path()).with_enumeration(false);
        host.create("notes").unwrap();

        assert_eq!(host.database_names().unwrap(), None);
        assert!(host.exists("notes"));
    }

    #[test]
    fn test_connections_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());

        let first = host.create("notes").unwrap();
        let second = host.open("notes").unwrap();
        assert_eq!(host.open_connections("notes"), 2);
        assert_eq!(second.name(), "notes");

        drop(first);
        assert_eq!(host.open_connections("notes"), 1);
        drop(second);
        assert_eq!(host.open_connections("notes"), 0);
    }

    #[test]
    fn test_delete_blocked_by_open_connection() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());

        let conn = host.create("notes").unwrap();
        assert!(matches!(host.delete("notes"), Err(ScannerError::Blocked(_))));
        assert!(host.exists("notes"));

        drop(conn);
        host.delete("notes").unwrap();
        assert!(!host.exists("notes"));
    }

    #[test]
    fn test_open_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());

        assert!(matches!(host.open("ghost"), Err(ScannerError::NotFound(_))));
        assert_eq!(host.open_connections("ghost"), 0);
        assert!(matches!(host.delete("ghost"), Err(ScannerError::NotFound(_))));
    }

    #[test]
    fn test_delete_blocked_while_open_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());
        drop(host.create("notes").unwrap());

        // An open that has registered but not yet touched the file
        let pending = host.reserve("notes");
        assert!(matches!(host.delete("notes"), Err(ScannerError::Blocked(_))));
        assert!(host.exists("notes"));

        drop(pending);
        host.delete("notes").unwrap();
    }

    #[test]
    fn test_concurrent_open_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());
        drop(host.create("notes").unwrap());

        let opener = {
            let host = host.clone();
            std::thread::spawn(move || {
                let mut opened = 0;
                for _ in 0..200 {
                    match host.open("notes") {
                        Ok(conn) => {
                            // A live connection must never outlive its file
                            assert!(host.exists("notes"));
                            drop(conn);
                            opened += 1;
                        }
                        Err(ScannerError::NotFound(_)) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                opened
            })
        };

        loop {
            match host.delete("notes") {
                Ok(()) => break,
                Err(ScannerError::Blocked(_)) => std::thread::yield_now(),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        opener.join().unwrap();
        assert!(!host.exists("notes"));
        assert_eq!(host.open_connections("notes"), 0);
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let host = DatabaseHost::new(dir.path());

        assert!(matches!(host.create("../escape"), Err(ScannerError::InvalidName(_))));
        assert!(matches!(host.open(""), Err(ScannerError::InvalidName(_))));
    }
}
