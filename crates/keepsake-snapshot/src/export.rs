//! Bulk export/import payload

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::record::{CookieAccount, Profile, StorageBackup};

pub type ProfilePartition = HashMap<String, Profile>;
pub type BackupPartition = HashMap<String, BTreeMap<String, StorageBackup>>;
pub type AccountPartition = HashMap<String, BTreeMap<String, CookieAccount>>;

/// Full contents of all three partitions.
///
/// Importing a bundle replaces every partition wholesale; a partition
/// missing from the document imports as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub profiles: ProfilePartition,
    #[serde(default)]
    pub local_storage_backups: BackupPartition,
    #[serde(default)]
    pub cookie_accounts: AccountPartition,
}
