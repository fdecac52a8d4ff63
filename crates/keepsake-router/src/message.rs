//! Request/response envelopes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RouterError;
use crate::page::PageTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back in the response
    pub id: String,
    /// Operation name, see [`OperationKind`]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    /// Page the request targets; falls back to the router's active page
    #[serde(default)]
    pub page: Option<PageTarget>,
}

impl Request {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
            page: None,
        }
    }

    pub fn on_page(mut self, url: impl Into<String>) -> Self {
        self.page = Some(PageTarget { url: url.into() });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: String, data: Value) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: String, error: String) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    SaveProfile,
    LoadProfile,
    DeleteProfile,
    ListProfiles,
    CreateBackup,
    RestoreBackup,
    DeleteBackup,
    ListBackups,
    ListBackupDomains,
    SaveAccount,
    LoadAccount,
    DeleteAccount,
    ListAccounts,
    ListAccountDomains,
    ExportData,
    ImportData,
    GetCookies,
    GetStorage,
    ApplyBackup,
    ApplyAccount,
    ListDatabases,
    GetDatabase,
    GetCollections,
    GetCollectionSample,
    DeleteDatabase,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SaveProfile => "saveProfile",
            OperationKind::LoadProfile => "loadProfile",
            OperationKind::DeleteProfile => "deleteProfile",
            OperationKind::ListProfiles => "listProfiles",
            OperationKind::CreateBackup => "createBackup",
            OperationKind::RestoreBackup => "restoreBackup",
            OperationKind::DeleteBackup => "deleteBackup",
            OperationKind::ListBackups => "listBackups",
            OperationKind::ListBackupDomains => "listBackupDomains",
            OperationKind::SaveAccount => "saveAccount",
            OperationKind::LoadAccount => "loadAccount",
            OperationKind::DeleteAccount => "deleteAccount",
            OperationKind::ListAccounts => "listAccounts",
            OperationKind::ListAccountDomains => "listAccountDomains",
            OperationKind::ExportData => "exportData",
            OperationKind::ImportData => "importData",
            OperationKind::GetCookies => "getCookies",
            OperationKind::GetStorage => "getStorage",
            OperationKind::ApplyBackup => "applyBackup",
            OperationKind::ApplyAccount => "applyAccount",
            OperationKind::ListDatabases => "listDatabases",
            OperationKind::GetDatabase => "getDatabase",
            OperationKind::GetCollections => "getCollections",
            OperationKind::GetCollectionSample => "getCollectionSample",
            OperationKind::DeleteDatabase => "deleteDatabase",
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saveProfile" => Ok(OperationKind::SaveProfile),
            "loadProfile" => Ok(OperationKind::LoadProfile),
            "deleteProfile" => Ok(OperationKind::DeleteProfile),
            "listProfiles" => Ok(OperationKind::ListProfiles),
            "createBackup" => Ok(OperationKind::CreateBackup),
            "restoreBackup" => Ok(OperationKind::RestoreBackup),
            "deleteBackup" => Ok(OperationKind::DeleteBackup),
            "listBackups" => Ok(OperationKind::ListBackups),
            "listBackupDomains" => Ok(OperationKind::ListBackupDomains),
            "saveAccount" => Ok(OperationKind::SaveAccount),
            "loadAccount" => Ok(OperationKind::LoadAccount),
            "deleteAccount" => Ok(OperationKind::DeleteAccount),
            "listAccounts" => Ok(OperationKind::ListAccounts),
            "listAccountDomains" => Ok(OperationKind::ListAccountDomains),
            "exportData" => Ok(OperationKind::ExportData),
            "importData" => Ok(OperationKind::ImportData),
            "getCookies" => Ok(OperationKind::GetCookies),
            "getStorage" => Ok(OperationKind::GetStorage),
            "applyBackup" => Ok(OperationKind::ApplyBackup),
            "applyAccount" => Ok(OperationKind::ApplyAccount),
            "listDatabases" => Ok(OperationKind::ListDatabases),
            "getDatabase" => Ok(OperationKind::GetDatabase),
            "getCollections" => Ok(OperationKind::GetCollections),
            "getCollectionSample" => Ok(OperationKind::GetCollectionSample),
            "deleteDatabase" => Ok(OperationKind::DeleteDatabase),
            _ => Err(RouterError::UnsupportedOperation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names_round_trip() {
        for name in ["saveProfile", "applyAccount", "getCollectionSample", "listBackupDomains"] {
            let kind: OperationKind = name.parse().unwrap();
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "formatJson".parse::<OperationKind>().unwrap_err();
        assert!(matches!(err, RouterError::UnsupportedOperation(ref k) if k == "formatJson"));
    }

    #[test]
    fn test_request_defaults() {
        let request: Request =
            serde_json::from_value(json!({"id": "1", "kind": "listProfiles"})).unwrap();
        assert_eq!(request.payload, Value::Null);
        assert!(request.page.is_none());
    }
}
