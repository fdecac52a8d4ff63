//! Scanner worker
//!
//! Runs on a dedicated thread and answers one request at a time. Every
//! operation opens its own connection and drops it before the response
//! goes out.

use serde_json::Value;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use crate::error::ScannerError;
use crate::host::DatabaseHost;
use crate::introspect::{self, CollectionInfo, DatabaseInfo};
use crate::protocol::{ScanOperation, ScanRequest, ScanResponse};
use crate::Result;

const CHANNEL_CAPACITY: usize = 64;

pub struct ScanWorker {
    host: DatabaseHost,
}

impl ScanWorker {
    pub fn new(host: DatabaseHost) -> Self {
        Self { host }
    }

    /// Answer one request. Failures become failure responses; nothing
    /// escapes as a panic or a dropped reply.
    pub fn handle(&self, request: ScanRequest) -> ScanResponse {
        let kind = request.operation.kind();

        match self.execute(request.operation) {
            Ok(data) => ScanResponse::ok(request.id, data),
            Err(e) => {
                tracing::warn!(request_id = %request.id, kind, error = %e, "Scan request failed");
                ScanResponse::err(request.id, e.to_string())
            }
        }
    }

    fn execute(&self, operation: ScanOperation) -> Result<Value> {
        let data = match operation {
            ScanOperation::ListDatabases => serde_json::to_value(self.list_databases()?)?,
            ScanOperation::GetDatabase { name } => serde_json::to_value(self.get_database(&name)?)?,
            ScanOperation::GetCollections { name } => {
                serde_json::to_value(self.get_collections(&name)?)?
            }
            ScanOperation::GetCollectionSample {
                database,
                collection,
                limit,
            } => Value::Array(self.get_collection_sample(&database, &collection, limit)?),
            ScanOperation::DeleteDatabase { name } => Value::Bool(self.delete_database(&name)?),
        };
        Ok(data)
    }

    /// Every database this context can see. A database that cannot be
    /// read is logged and left out; it does not fail the listing.
    pub fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let Some(names) = self.host.database_names()? else {
            tracing::warn!("Database enumeration not supported in this context");
            return Ok(Vec::new());
        };

        let mut databases = Vec::with_capacity(names.len());
        for name in names {
            match self.get_database(&name) {
                Ok(info) => databases.push(info),
                Err(e) => {
                    tracing::warn!(database = %name, error = %e, "Skipping unreadable database");
                }
            }
        }

        tracing::debug!(count = databases.len(), "Listed databases");

        Ok(databases)
    }

    pub fn get_database(&self, name: &str) -> Result<DatabaseInfo> {
        let conn = self.host.open(name)?;
        let version = introspect::schema_version(&conn)?;
        let collections = introspect::collections(&conn)?;
        Ok(DatabaseInfo::new(name.to_string(), version, collections))
    }

    pub fn get_collections(&self, name: &str) -> Result<Vec<CollectionInfo>> {
        let conn = self.host.open(name)?;
        introspect::collections(&conn)
    }

    pub fn get_collection_sample(
        &self,
        database: &str,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<Value>> {
        let conn = self.host.open(database)?;
        introspect::sample(&conn, database, collection, limit)
    }

    pub fn delete_database(&self, name: &str) -> Result<bool> {
        self.host.delete(name)?;
        Ok(true)
    }
}

/// Start a worker thread over `host`.
///
/// Returns the request sender, the response receiver and the thread
/// handle. The thread exits once the request sender is dropped or the
/// response receiver goes away.
pub fn spawn_worker(
    host: DatabaseHost,
) -> Result<(
    mpsc::Sender<ScanRequest>,
    mpsc::Receiver<ScanResponse>,
    JoinHandle<()>,
)> {
    let (request_tx, mut request_rx) = mpsc::channel::<ScanRequest>(CHANNEL_CAPACITY);
    let (response_tx, response_rx) = mpsc::channel::<ScanResponse>(CHANNEL_CAPACITY);

    let worker = ScanWorker::new(host);
    let handle = std::thread::Builder::new()
        .name("keepsake-scanner".to_string())
        .spawn(move || {
            tracing::debug!(root = %worker.host.root().display(), "Scanner worker started");

            while let Some(request) = request_rx.blocking_recv() {
                let response = worker.handle(request);
                if response_tx.blocking_send(response).is_err() {
                    break;
                }
            }

            tracing::debug!("Scanner worker stopped");
        })
        .map_err(ScannerError::Io)?;

    Ok((request_tx, response_rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_host(dir: &std::path::Path) -> DatabaseHost {
        let host = DatabaseHost::new(dir);
        let conn = host.create("app").unwrap();
        conn.execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, title TEXT);
             INSERT INTO notes (title) VALUES ('a'), ('b'), ('c');",
        )
        .unwrap();
        host
    }

    #[test]
    fn test_list_databases_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScanWorker::new(DatabaseHost::new(dir.path()));
        assert!(worker.list_databases().unwrap().is_empty());
    }

    #[test]
    fn test_list_databases_unsupported_context() {
        let dir = tempfile::tempdir().unwrap();
        let host = seeded_host(dir.path()).with_enumeration(false);
        let worker = ScanWorker::new(host);

        assert!(worker.list_databases().unwrap().is_empty());
        // Direct access by name still works
        assert_eq!(worker.get_collections("app").unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_database_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let host = seeded_host(dir.path());
        std::fs::write(dir.path().join("broken.db"), b"this is not a sqlite file at all").unwrap();

        let worker = ScanWorker::new(host);
        let databases = worker.list_databases().unwrap();

        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].name, "app");
        assert_eq!(databases[0].size, 3 * crate::ESTIMATED_RECORD_SIZE);
    }

    #[test]
    fn test_operations_release_connections() {
        let dir = tempfile::tempdir().unwrap();
        let host = seeded_host(dir.path());
        let worker = ScanWorker::new(host.clone());

        worker.list_databases().unwrap();
        worker.get_collection_sample("app", "notes", 2).unwrap();
        assert_eq!(host.open_connections("app"), 0);

        assert!(worker.delete_database("app").unwrap());
        assert!(!host.exists("app"));
    }

    #[test]
    fn test_handle_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScanWorker::new(DatabaseHost::new(dir.path()));

        let response = worker.handle(ScanRequest::new(
            "r1",
            ScanOperation::GetCollections {
                name: "ghost".to_string(),
            },
        ));

        assert_eq!(response.id, "r1");
        assert!(!response.success);
        assert!(response.error.unwrap().contains("ghost"));
    }
}
