//! Snapshot record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key/value storage contents as captured from a page.
pub type StorageData = Map<String, Value>;

/// A named, opaque configuration blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(name: String, payload: Value) -> Self {
        Self {
            name,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A captured copy of one domain's key/value storage.
///
/// Serialises with a derived `itemCount`; the field is ignored on read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBackup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub domain: String,
    #[serde(default)]
    pub data: StorageData,
    pub created_at: DateTime<Utc>,
}

impl StorageBackup {
    pub fn item_count(&self) -> usize {
        self.data.len()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupRecord<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    domain: &'a str,
    data: &'a StorageData,
    created_at: &'a DateTime<Utc>,
    item_count: usize,
}

impl Serialize for StorageBackup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BackupRecord {
            id: &self.id,
            name: &self.name,
            description: &self.description,
            domain: &self.domain,
            data: &self.data,
            created_at: &self.created_at,
            item_count: self.item_count(),
        }
        .serialize(serializer)
    }
}

/// Browser cookie as read from, or written to, a page origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Seconds since the Unix epoch; absent for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: default_cookie_path(),
            secure: false,
            http_only: false,
            same_site: None,
            expiration_date: None,
            host_only: false,
            session: true,
            store_id: None,
        }
    }
}

/// A captured copy of one domain's cookie set, serialised with a
/// derived `cookieCount`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub domain: String,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    pub created_at: DateTime<Utc>,
}

impl CookieAccount {
    pub fn cookie_count(&self) -> usize {
        self.cookies.len()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    domain: &'a str,
    cookies: &'a [Cookie],
    created_at: &'a DateTime<Utc>,
    cookie_count: usize,
}

impl Serialize for CookieAccount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AccountRecord {
            id: &self.id,
            name: &self.name,
            description: &self.description,
            domain: &self.domain,
            cookies: &self.cookies,
            created_at: &self.created_at,
            cookie_count: self.cookie_count(),
        }
        .serialize(serializer)
    }
}

/// Listing view of a backup, without its payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub item_count: usize,
}

impl From<&StorageBackup> for BackupInfo {
    fn from(backup: &StorageBackup) -> Self {
        Self {
            id: backup.id.clone(),
            name: backup.name.clone(),
            description: backup.description.clone(),
            domain: backup.domain.clone(),
            created_at: backup.created_at,
            item_count: backup.item_count(),
        }
    }
}

/// Listing view of an account, without its cookies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub cookie_count: usize,
}

impl From<&CookieAccount> for AccountInfo {
    fn from(account: &CookieAccount) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            description: account.description.clone(),
            domain: account.domain.clone(),
            created_at: account.created_at,
            cookie_count: account.cookie_count(),
        }
    }
}
