//! Scanner client
//!
//! Async front for the worker channel. Each request is tagged with a
//! correlation id and parked until the response carrying the same id
//! comes back. A caller that stops waiting simply never reads its
//! response; the scan still runs to completion.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::ScannerError;
use crate::host::DatabaseHost;
use crate::introspect::{CollectionInfo, DatabaseInfo};
use crate::protocol::{ScanOperation, ScanRequest, ScanResponse};
use crate::worker::spawn_worker;
use crate::Result;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<ScanResponse>>>>;

pub struct ScannerClient {
    requests: mpsc::Sender<ScanRequest>,
    /// Callers waiting on a response, by correlation id
    pending: Pending,
}

impl ScannerClient {
    /// Spawn a worker over `host` and connect to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(host: DatabaseHost) -> Result<Self> {
        let (requests, responses, _handle) = spawn_worker(host)?;
        Ok(Self::connect(requests, responses))
    }

    /// Connect to an already running worker.
    pub fn connect(
        requests: mpsc::Sender<ScanRequest>,
        mut responses: mpsc::Receiver<ScanResponse>,
    ) -> Self {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let routes = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(response) = responses.recv().await {
                let waiter = routes.lock().remove(&response.id);
                match waiter {
                    Some(tx) => {
                        if tx.send(response).is_err() {
                            tracing::debug!("Discarded scan response for abandoned request");
                        }
                    }
                    None => {
                        tracing::warn!(request_id = %response.id, "Scan response with no pending request");
                    }
                }
            }

            // Worker gone: wake everyone still waiting
            routes.lock().clear();
        });

        Self { requests, pending }
    }

    /// Send `operation` under a fresh correlation id.
    pub async fn request(&self, operation: ScanOperation) -> Result<ScanResponse> {
        self.send(ScanRequest::new(Uuid::new_v4().to_string(), operation))
            .await
    }

    /// Send a request under its caller-supplied id and wait for the
    /// matching response.
    pub async fn send(&self, request: ScanRequest) -> Result<ScanResponse> {
        let (tx, rx) = oneshot::channel();
        let id = request.id.clone();

        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&id) {
                return Err(ScannerError::DuplicateRequest(id));
            }
            pending.insert(id.clone(), tx);
        }

        if self.requests.send(request).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(ScannerError::ChannelClosed);
        }

        rx.await.map_err(|_| ScannerError::ChannelClosed)
    }

    async fn call<T: DeserializeOwned>(&self, operation: ScanOperation) -> Result<T> {
        let response = self.request(operation).await?;
        if !response.success {
            return Err(ScannerError::Failed(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(serde_json::from_value(response.data.unwrap_or(Value::Null))?)
    }

    pub async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.call(ScanOperation::ListDatabases).await
    }

    pub async fn get_database(&self, name: &str) -> Result<DatabaseInfo> {
        self.call(ScanOperation::GetDatabase {
            name: name.to_string(),
        })
        .await
    }

    pub async fn get_collections(&self, name: &str) -> Result<Vec<CollectionInfo>> {
        self.call(ScanOperation::GetCollections {
            name: name.to_string(),
        })
        .await
    }

    pub async fn get_collection_sample(
        &self,
        database: &str,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<Value>> {
        self.call(ScanOperation::GetCollectionSample {
            database: database.to_string(),
            collection: collection.to_string(),
            limit,
        })
        .await
    }

    pub async fn delete_database(&self, name: &str) -> Result<bool> {
        self.call(ScanOperation::DeleteDatabase {
            name: name.to_string(),
        })
        .await
    }
}

impl Clone for ScannerClient {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_host(dir: &std::path::Path) -> DatabaseHost {
        let host = DatabaseHost::new(dir);
        let conn = host.create("app").unwrap();
        conn.execute_batch(
            "PRAGMA user_version = 2;
             CREATE TABLE notes (id INTEGER PRIMARY KEY, title TEXT);
             CREATE UNIQUE INDEX idx_notes_title ON notes(title);
             INSERT INTO notes (title) VALUES ('a'), ('b');",
        )
        .unwrap();
        host
    }

    #[tokio::test]
    async fn test_empty_context_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScannerClient::start(DatabaseHost::new(dir.path())).unwrap();

        assert!(client.list_databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_introspection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScannerClient::start(seeded_host(dir.path())).unwrap();

        let databases = client.list_databases().await.unwrap();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].version, 2);

        let collections = client.get_collections("app").await.unwrap();
        assert_eq!(collections[0].record_count, 2);
        assert!(collections[0].indexes[0].unique);

        let rows = client.get_collection_sample("app", "notes", 1).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_responses_match_request_ids() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScannerClient::start(seeded_host(dir.path())).unwrap();

        let a = client.send(ScanRequest::new("a", ScanOperation::ListDatabases));
        let b = client.send(ScanRequest::new(
            "b",
            ScanOperation::GetCollections {
                name: "missing".to_string(),
            },
        ));
        let (a, b) = tokio::join!(a, b);

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.id, "a");
        assert!(a.success);
        assert_eq!(b.id, "b");
        assert!(!b.success);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_open_connection() {
        let dir = tempfile::tempdir().unwrap();
        let host = seeded_host(dir.path());
        let client = ScannerClient::start(host.clone()).unwrap();

        let held = host.open("app").unwrap();
        let err = client.delete_database("app").await.unwrap_err();
        assert!(err.to_string().contains("blocked"));

        let names: Vec<String> = client
            .list_databases()
            .await
            .unwrap()
            .into_iter()
            .map(|db| db.name)
            .collect();
        assert_eq!(names, vec!["app"]);

        drop(held);
        assert!(client.delete_database("app").await.unwrap());
        assert!(client.list_databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_worker_fails_requests() {
        let (requests, responses) = {
            let (tx, rx) = mpsc::channel::<ScanRequest>(1);
            drop(rx);
            let (_resp_tx, resp_rx) = mpsc::channel::<ScanResponse>(1);
            (tx, resp_rx)
        };
        let client = ScannerClient::connect(requests, responses);

        assert!(matches!(
            client.list_databases().await,
            Err(ScannerError::ChannelClosed)
        ));
    }
}
