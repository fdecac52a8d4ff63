//! Main state container

use std::sync::Arc;

use keepsake_router::{MemoryPages, PageCollector, Router};
use keepsake_scanner::{DatabaseHost, ScannerClient};
use keepsake_snapshot::SnapshotStore;
use keepsake_storage::Database;

use crate::config::Config;
use crate::Result;

/// One process-wide instance of every component, built from a
/// [`Config`] and handed to callers explicitly.
pub struct Keepsake {
    config: Config,
    store: SnapshotStore,
    host: DatabaseHost,
    scanner: ScannerClient,
    router: Router,
}

impl Keepsake {
    /// Open storage, start the scanner worker and build the router,
    /// using in-process page state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_pages(config, Arc::new(MemoryPages::new()))
    }

    pub fn with_pages(config: Config, pages: Arc<dyn PageCollector>) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        Self::assemble(config, db, pages)
    }

    /// Same as [`Keepsake::new`] but with the snapshot database in memory.
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::assemble(config, Database::open_in_memory()?, Arc::new(MemoryPages::new()))
    }

    fn assemble(config: Config, db: Database, pages: Arc<dyn PageCollector>) -> Result<Self> {
        let store = SnapshotStore::with_database(db)?;

        let host = DatabaseHost::new(config.databases_dir.clone())
            .with_enumeration(config.enumerate_databases);
        let scanner = ScannerClient::start(host.clone())?;

        let router = Router::new(store.clone(), scanner.clone(), pages);

        tracing::info!(
            database = %config.database_path.display(),
            databases_dir = %config.databases_dir.display(),
            "Keepsake initialized"
        );

        Ok(Self {
            config,
            store,
            host,
            scanner,
            router,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn database_host(&self) -> &DatabaseHost {
        &self.host
    }

    pub fn scanner(&self) -> &ScannerClient {
        &self.scanner
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

impl Clone for Keepsake {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            host: self.host.clone(),
            scanner: self.scanner.clone(),
            router: self.router.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_router::Request;
    use serde_json::json;

    #[tokio::test]
    async fn test_keepsake_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        let keepsake = Keepsake::new(config.clone()).unwrap();
        assert!(config.database_path.exists());

        let response = keepsake
            .router()
            .dispatch(Request::new(
                "1",
                "createBackup",
                json!({"domain": "example.com", "name": "daily", "data": {"a": 1}}),
            ))
            .await;
        assert!(response.success);

        assert_eq!(keepsake.store().list_backups("example.com").len(), 1);
        assert!(keepsake.scanner().list_databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        {
            let keepsake = Keepsake::new(config.clone()).unwrap();
            keepsake.store().save_profile("work", json!({"v": 1})).unwrap();
        }

        let reopened = Keepsake::new(config).unwrap();
        assert_eq!(
            reopened.store().load_profile("work").unwrap().payload,
            json!({"v": 1})
        );
    }

    #[tokio::test]
    async fn test_scanner_sees_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let keepsake = Keepsake::in_memory(Config::new(dir.path().to_path_buf())).unwrap();

        drop(keepsake.database_host().create("app").unwrap());

        let databases = keepsake.scanner().list_databases().await.unwrap();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].name, "app");
    }
}
