//! Request dispatch

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use keepsake_scanner::{ScanOperation, ScannerClient, ScannerError};
use keepsake_snapshot::{
    normalize_domain, AccountInfo, BackupInfo, Cookie, ExportBundle, SnapshotStore, StorageData,
};

use crate::error::RouterError;
use crate::message::{OperationKind, Request, Response};
use crate::page::{Page, PageCollector, PageTarget, StorageArea};
use crate::Result;

#[derive(Deserialize)]
struct ProfileName {
    name: String,
}

#[derive(Deserialize)]
struct SaveProfile {
    name: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DomainScope {
    domain: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRef {
    #[serde(default)]
    domain: Option<String>,
    id: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CreateBackup {
    domain: Option<String>,
    name: String,
    description: String,
    /// Captured from the page when absent
    data: Option<StorageData>,
    area: StorageArea,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SaveAccount {
    domain: Option<String>,
    name: String,
    description: String,
    /// Captured from the page when absent
    cookies: Option<Vec<Cookie>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GetStorage {
    area: StorageArea,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyBackup {
    #[serde(default)]
    domain: Option<String>,
    id: String,
    #[serde(default)]
    area: StorageArea,
    #[serde(default = "default_true")]
    clear: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyAccount {
    #[serde(default)]
    domain: Option<String>,
    id: String,
    #[serde(default = "default_true")]
    clear: bool,
}

fn default_true() -> bool {
    true
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T> {
    // An absent payload reads as an empty object
    let payload = if payload.is_null() { json!({}) } else { payload };
    serde_json::from_value(payload).map_err(|e| RouterError::InvalidPayload(e.to_string()))
}

pub struct Router {
    store: SnapshotStore,
    scanner: ScannerClient,
    pages: Arc<dyn PageCollector>,
    /// Page used when a request does not name one
    active_page: Arc<RwLock<Option<PageTarget>>>,
}

impl Router {
    pub fn new(store: SnapshotStore, scanner: ScannerClient, pages: Arc<dyn PageCollector>) -> Self {
        Self {
            store,
            scanner,
            pages,
            active_page: Arc::new(RwLock::new(None)),
        }
    }

    pub fn set_active_page(&self, page: Option<PageTarget>) {
        *self.active_page.write() = page;
    }

    pub fn active_page(&self) -> Option<PageTarget> {
        self.active_page.read().clone()
    }

    /// Handle one request. Always produces exactly one response with the
    /// request's id.
    pub async fn dispatch(&self, request: Request) -> Response {
        let id = request.id.clone();
        let kind = request.kind.clone();

        match self.route(request).await {
            Ok(data) => {
                tracing::debug!(request_id = %id, kind = %kind, "Request handled");
                Response::ok(id, data)
            }
            Err(e) => {
                tracing::warn!(request_id = %id, kind = %kind, error = %e, "Request failed");
                Response::err(id, e.to_string())
            }
        }
    }

    /// Accept requests until `inbound` closes. Each request runs as its
    /// own task, so a slow one never holds up the next.
    pub async fn serve(&self, mut inbound: mpsc::Receiver<Request>, outbound: mpsc::Sender<Response>) {
        while let Some(request) = inbound.recv().await {
            let router = self.clone();
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let response = router.dispatch(request).await;
                if outbound.send(response).await.is_err() {
                    tracing::debug!("Response channel closed, dropping response");
                }
            });
        }

        tracing::info!("Request channel closed, router stopping");
    }

    async fn route(&self, request: Request) -> Result<Value> {
        let kind: OperationKind = request.kind.parse()?;
        let Request { payload, page, .. } = request;

        match kind {
            OperationKind::ListDatabases
            | OperationKind::GetDatabase
            | OperationKind::GetCollections
            | OperationKind::GetCollectionSample
            | OperationKind::DeleteDatabase => self.scan(kind, payload).await,
            local => {
                // Store and page calls wait on locks and disk
                let router = self.clone();
                tokio::task::spawn_blocking(move || router.handle(local, payload, page)).await?
            }
        }
    }

    /// Serve a snapshot store or page operation on the calling thread.
    fn handle(&self, kind: OperationKind, payload: Value, page: Option<PageTarget>) -> Result<Value> {
        match kind {
            OperationKind::SaveProfile => {
                let args: SaveProfile = parse(payload)?;
                let profile = self.store.save_profile(&args.name, args.data)?;
                Ok(serde_json::to_value(profile)?)
            }
            OperationKind::LoadProfile => {
                let args: ProfileName = parse(payload)?;
                Ok(serde_json::to_value(self.store.load_profile(&args.name))?)
            }
            OperationKind::DeleteProfile => {
                let args: ProfileName = parse(payload)?;
                self.store.delete_profile(&args.name)?;
                Ok(Value::Null)
            }
            OperationKind::ListProfiles => Ok(serde_json::to_value(self.store.list_profiles())?),

            OperationKind::CreateBackup => {
                let args: CreateBackup = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                let data = match args.data {
                    Some(data) => data,
                    None => {
                        let page = self.page(page.as_ref())?;
                        self.pages.read_storage(&page.origin, args.area)?
                    }
                };
                let id = self
                    .store
                    .create_backup(&domain, &args.name, &args.description, data)?;
                Ok(json!({ "id": id, "domain": normalize_domain(&domain)? }))
            }
            OperationKind::RestoreBackup => {
                let args: RecordRef = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                Ok(self
                    .store
                    .restore_backup(&domain, &args.id)
                    .map(Value::Object)
                    .unwrap_or(Value::Null))
            }
            OperationKind::DeleteBackup => {
                let args: RecordRef = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                self.store.delete_backup(&domain, &args.id)?;
                Ok(Value::Null)
            }
            OperationKind::ListBackups => {
                let args: DomainScope = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                let backups: Vec<BackupInfo> = self
                    .store
                    .list_backups(&domain)
                    .iter()
                    .map(BackupInfo::from)
                    .collect();
                Ok(serde_json::to_value(backups)?)
            }
            OperationKind::ListBackupDomains => {
                Ok(serde_json::to_value(self.store.backup_domains())?)
            }

            OperationKind::SaveAccount => {
                let args: SaveAccount = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                let cookies = match args.cookies {
                    Some(cookies) => cookies,
                    None => {
                        let page = self.page(page.as_ref())?;
                        self.pages.cookies(&page.origin)?
                    }
                };
                let id = self
                    .store
                    .save_account(&domain, &args.name, &args.description, cookies)?;
                Ok(json!({ "id": id, "domain": normalize_domain(&domain)? }))
            }
            OperationKind::LoadAccount => {
                let args: RecordRef = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                Ok(serde_json::to_value(self.store.load_account(&domain, &args.id))?)
            }
            OperationKind::DeleteAccount => {
                let args: RecordRef = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                self.store.delete_account(&domain, &args.id)?;
                Ok(Value::Null)
            }
            OperationKind::ListAccounts => {
                let args: DomainScope = parse(payload)?;
                let domain = self.domain_for(args.domain, page.as_ref())?;
                let accounts: Vec<AccountInfo> = self
                    .store
                    .list_accounts(&domain)
                    .iter()
                    .map(AccountInfo::from)
                    .collect();
                Ok(serde_json::to_value(accounts)?)
            }
            OperationKind::ListAccountDomains => {
                Ok(serde_json::to_value(self.store.account_domains())?)
            }

            OperationKind::ExportData => Ok(serde_json::to_value(self.store.export())?),
            OperationKind::ImportData => {
                let bundle: ExportBundle = parse(payload)?;
                self.store.import(bundle)?;
                Ok(Value::Null)
            }

            OperationKind::GetCookies => {
                let page = self.page(page.as_ref())?;
                Ok(serde_json::to_value(self.pages.cookies(&page.origin)?)?)
            }
            OperationKind::GetStorage => {
                let args: GetStorage = parse(payload)?;
                let page = self.page(page.as_ref())?;
                Ok(Value::Object(self.pages.read_storage(&page.origin, args.area)?))
            }
            OperationKind::ApplyBackup => {
                let args: ApplyBackup = parse(payload)?;
                let target = self.page(page.as_ref())?;
                let domain = args.domain.unwrap_or_else(|| target.domain.clone());
                let Some(data) = self.store.restore_backup(&domain, &args.id) else {
                    return Ok(Value::Null);
                };
                self.pages
                    .write_storage(&target.origin, args.area, &data, args.clear)?;

                tracing::info!(origin = %target.origin, backup_id = %args.id, items = data.len(), "Applied backup");

                Ok(json!({ "applied": data.len() }))
            }
            OperationKind::ApplyAccount => {
                let args: ApplyAccount = parse(payload)?;
                let target = self.page(page.as_ref())?;
                let domain = args.domain.unwrap_or_else(|| target.domain.clone());
                let Some(cookies) = self.store.load_account(&domain, &args.id) else {
                    return Ok(Value::Null);
                };
                self.pages.set_cookies(&target.origin, &cookies, args.clear)?;

                tracing::info!(origin = %target.origin, account_id = %args.id, cookies = cookies.len(), "Applied account");

                Ok(json!({ "applied": cookies.len() }))
            }

            // Relayed by `route` without leaving the runtime
            OperationKind::ListDatabases
            | OperationKind::GetDatabase
            | OperationKind::GetCollections
            | OperationKind::GetCollectionSample
            | OperationKind::DeleteDatabase => {
                Err(RouterError::UnsupportedOperation(kind.as_str().to_string()))
            }
        }
    }

    /// Relay a scanner operation and unwrap its response.
    async fn scan(&self, kind: OperationKind, payload: Value) -> Result<Value> {
        let mut envelope = json!({ "kind": kind.as_str() });
        let empty = payload.is_null() || payload.as_object().is_some_and(|o| o.is_empty());
        if !empty {
            envelope["payload"] = payload;
        }
        let operation: ScanOperation = serde_json::from_value(envelope)
            .map_err(|e| RouterError::InvalidPayload(e.to_string()))?;

        let response = self.scanner.request(operation).await?;
        if response.success {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(ScannerError::Failed(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            )
            .into())
        }
    }

    fn page(&self, requested: Option<&PageTarget>) -> Result<Page> {
        match requested {
            Some(target) => Page::resolve(target),
            None => {
                let active = self.active_page.read().clone();
                active
                    .as_ref()
                    .map(Page::resolve)
                    .unwrap_or(Err(RouterError::NoActivePage))
            }
        }
    }

    /// Explicit domain if given, otherwise the target page's.
    fn domain_for(&self, domain: Option<String>, requested: Option<&PageTarget>) -> Result<String> {
        match domain {
            Some(domain) => Ok(domain),
            None => Ok(self.page(requested)?.domain),
        }
    }
}

impl Clone for Router {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scanner: self.scanner.clone(),
            pages: Arc::clone(&self.pages),
            active_page: Arc::clone(&self.active_page),
        }
    }
}
