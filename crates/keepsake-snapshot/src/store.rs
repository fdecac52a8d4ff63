//! Snapshot Store
//!
//! Repository over the three persisted partitions. State is loaded once
//! when the store is opened and every mutation writes the affected
//! partition back before the call returns. The cache only changes after
//! the write succeeds, so a failed write leaves both sides as they were.

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use keepsake_storage::{Database, Persistence};

use crate::domain::normalize_domain;
use crate::error::SnapshotError;
use crate::export::{AccountPartition, BackupPartition, ExportBundle, ProfilePartition};
use crate::id::{IdGenerator, RecordKind};
use crate::record::{Cookie, CookieAccount, Profile, StorageBackup, StorageData};
use crate::Result;

pub const PROFILES_PARTITION: &str = "profiles";
pub const BACKUPS_PARTITION: &str = "localStorageBackups";
pub const ACCOUNTS_PARTITION: &str = "cookieAccounts";

#[derive(Default)]
struct StoreState {
    profiles: ProfilePartition,
    backups: BackupPartition,
    accounts: AccountPartition,
    ids: IdGenerator,
}

pub struct SnapshotStore {
    /// In-memory mirror of the persisted partitions
    state: Arc<RwLock<StoreState>>,
    /// Sole write path to durable storage
    persistence: Arc<dyn Persistence>,
}

impl SnapshotStore {
    /// Open a store over `persistence`, loading all three partitions.
    /// Partitions that were never written load as empty.
    pub fn open(persistence: Arc<dyn Persistence>) -> Result<Self> {
        let profiles: ProfilePartition = load_partition(&*persistence, PROFILES_PARTITION)?;
        let backups: BackupPartition = load_partition(&*persistence, BACKUPS_PARTITION)?;
        let accounts: AccountPartition = load_partition(&*persistence, ACCOUNTS_PARTITION)?;

        tracing::info!(
            profiles = profiles.len(),
            backup_domains = backups.len(),
            account_domains = accounts.len(),
            "Loaded snapshot store"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(StoreState {
                profiles,
                backups,
                accounts,
                ids: IdGenerator::new(),
            })),
            persistence,
        })
    }

    pub fn with_database(db: Database) -> Result<Self> {
        Self::open(Arc::new(db))
    }

    fn persist<T: Serialize>(&self, key: &str, partition: &T) -> Result<()> {
        let json = serde_json::to_string(partition)?;
        self.persistence.store_partition(key, &json)?;
        Ok(())
    }

    // === Profiles ===

    /// Save `payload` under `name`, replacing any profile of that name.
    pub fn save_profile(&self, name: &str, payload: Value) -> Result<Profile> {
        if name.trim().is_empty() {
            return Err(SnapshotError::EmptyName);
        }

        let profile = Profile::new(name.to_string(), payload);

        let mut state = self.state.write();
        let mut next = state.profiles.clone();
        let replaced = next.insert(profile.name.clone(), profile.clone()).is_some();
        self.persist(PROFILES_PARTITION, &next)?;
        state.profiles = next;

        tracing::info!(profile = %profile.name, replaced, "Saved profile");

        Ok(profile)
    }

    pub fn load_profile(&self, name: &str) -> Option<Profile> {
        self.state.read().profiles.get(name).cloned()
    }

    pub fn delete_profile(&self, name: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.profiles.contains_key(name) {
            return Ok(());
        }

        let mut next = state.profiles.clone();
        next.remove(name);
        self.persist(PROFILES_PARTITION, &next)?;
        state.profiles = next;

        tracing::info!(profile = %name, "Deleted profile");

        Ok(())
    }

    /// All profiles, in no particular order
    pub fn list_profiles(&self) -> Vec<Profile> {
        self.state.read().profiles.values().cloned().collect()
    }

    // === Storage backups ===

    /// Capture `data` as a new backup for `domain` and return its id.
    pub fn create_backup(
        &self,
        domain: &str,
        name: &str,
        description: &str,
        data: StorageData,
    ) -> Result<String> {
        let domain = normalize_domain(domain)?;
        let now = Utc::now();

        let mut guard = self.state.write();
        let state = &mut *guard;

        let existing = state.backups.get(&domain);
        let id = state
            .ids
            .next(RecordKind::Backup, &domain, now.timestamp_millis(), |candidate| {
                existing.is_some_and(|records| records.contains_key(candidate))
            });

        let backup = StorageBackup {
            id: id.clone(),
            name: display_name(name, "Backup", &now),
            description: description.to_string(),
            domain: domain.clone(),
            data,
            created_at: now,
        };
        let item_count = backup.item_count();

        let mut next = state.backups.clone();
        next.entry(domain.clone())
            .or_default()
            .insert(id.clone(), backup);
        self.persist(BACKUPS_PARTITION, &next)?;
        state.backups = next;

        tracing::info!(
            domain = %domain,
            backup_id = %id,
            item_count,
            "Created backup"
        );

        Ok(id)
    }

    /// Copy of a backup's data, or `None` when the domain or id is unknown.
    /// A backup that captured nothing yields `Some` of an empty map.
    pub fn restore_backup(&self, domain: &str, id: &str) -> Option<StorageData> {
        self.get_backup(domain, id).map(|backup| backup.data)
    }

    pub fn get_backup(&self, domain: &str, id: &str) -> Option<StorageBackup> {
        let domain = normalize_domain(domain).ok()?;
        self.state
            .read()
            .backups
            .get(&domain)
            .and_then(|records| records.get(id))
            .cloned()
    }

    pub fn delete_backup(&self, domain: &str, id: &str) -> Result<()> {
        let Ok(domain) = normalize_domain(domain) else {
            return Ok(());
        };

        let mut state = self.state.write();
        let present = state
            .backups
            .get(&domain)
            .is_some_and(|records| records.contains_key(id));
        if !present {
            return Ok(());
        }

        let mut next = state.backups.clone();
        remove_record(&mut next, &domain, id);
        self.persist(BACKUPS_PARTITION, &next)?;
        state.backups = next;

        tracing::info!(domain = %domain, backup_id = %id, "Deleted backup");

        Ok(())
    }

    /// Backups for `domain` in creation order; unknown domains yield none.
    pub fn list_backups(&self, domain: &str) -> Vec<StorageBackup> {
        let Ok(domain) = normalize_domain(domain) else {
            return Vec::new();
        };
        self.state
            .read()
            .backups
            .get(&domain)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn backup_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.state.read().backups.keys().cloned().collect();
        domains.sort();
        domains
    }

    // === Cookie accounts ===

    /// Capture `cookies` as a new account for `domain` and return its id.
    pub fn save_account(
        &self,
        domain: &str,
        name: &str,
        description: &str,
        cookies: Vec<Cookie>,
    ) -> Result<String> {
        let domain = normalize_domain(domain)?;
        let now = Utc::now();

        let mut guard = self.state.write();
        let state = &mut *guard;

        let existing = state.accounts.get(&domain);
        let id = state
            .ids
            .next(RecordKind::Account, &domain, now.timestamp_millis(), |candidate| {
                existing.is_some_and(|records| records.contains_key(candidate))
            });

        let account = CookieAccount {
            id: id.clone(),
            name: display_name(name, "Account", &now),
            description: description.to_string(),
            domain: domain.clone(),
            cookies,
            created_at: now,
        };
        let cookie_count = account.cookie_count();

        let mut next = state.accounts.clone();
        next.entry(domain.clone())
            .or_default()
            .insert(id.clone(), account);
        self.persist(ACCOUNTS_PARTITION, &next)?;
        state.accounts = next;

        tracing::info!(
            domain = %domain,
            account_id = %id,
            cookie_count,
            "Saved account"
        );

        Ok(id)
    }

    /// Copy of an account's cookies, or `None` when the domain or id is unknown.
    pub fn load_account(&self, domain: &str, id: &str) -> Option<Vec<Cookie>> {
        self.get_account(domain, id).map(|account| account.cookies)
    }

    pub fn get_account(&self, domain: &str, id: &str) -> Option<CookieAccount> {
        let domain = normalize_domain(domain).ok()?;
        self.state
            .read()
            .accounts
            .get(&domain)
            .and_then(|records| records.get(id))
            .cloned()
    }

    pub fn delete_account(&self, domain: &str, id: &str) -> Result<()> {
        let Ok(domain) = normalize_domain(domain) else {
            return Ok(());
        };

        let mut state = self.state.write();
        let present = state
            .accounts
            .get(&domain)
            .is_some_and(|records| records.contains_key(id));
        if !present {
            return Ok(());
        }

        let mut next = state.accounts.clone();
        remove_record(&mut next, &domain, id);
        self.persist(ACCOUNTS_PARTITION, &next)?;
        state.accounts = next;

        tracing::info!(domain = %domain, account_id = %id, "Deleted account");

        Ok(())
    }

    pub fn list_accounts(&self, domain: &str) -> Vec<CookieAccount> {
        let Ok(domain) = normalize_domain(domain) else {
            return Vec::new();
        };
        self.state
            .read()
            .accounts
            .get(&domain)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn account_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.state.read().accounts.keys().cloned().collect();
        domains.sort();
        domains
    }

    // === Export / import ===

    pub fn export(&self) -> ExportBundle {
        let state = self.state.read();
        ExportBundle {
            profiles: state.profiles.clone(),
            local_storage_backups: state.backups.clone(),
            cookie_accounts: state.accounts.clone(),
        }
    }

    /// Replace all three partitions with the contents of `bundle`.
    ///
    /// Domain keys go through [`normalize_domain`] and every record is
    /// re-keyed to the domain, id or name it is filed under. Keys that
    /// normalise to the same domain are merged. A bundle with an unusable
    /// domain or a blank profile name is rejected and nothing changes.
    pub fn import(&self, bundle: ExportBundle) -> Result<()> {
        let profiles = rekey_profiles(bundle.profiles)?;
        let backups = rekey_records(bundle.local_storage_backups)?;
        let accounts = rekey_records(bundle.cookie_accounts)?;

        let entries = [
            (PROFILES_PARTITION, serde_json::to_string(&profiles)?),
            (BACKUPS_PARTITION, serde_json::to_string(&backups)?),
            (ACCOUNTS_PARTITION, serde_json::to_string(&accounts)?),
        ];

        let mut state = self.state.write();
        self.persistence.store_partitions(&entries)?;

        tracing::info!(
            profiles = profiles.len(),
            backup_domains = backups.len(),
            account_domains = accounts.len(),
            "Imported snapshot data"
        );

        state.profiles = profiles;
        state.backups = backups;
        state.accounts = accounts;

        Ok(())
    }
}

impl Clone for SnapshotStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            persistence: Arc::clone(&self.persistence),
        }
    }
}

fn load_partition<T>(persistence: &dyn Persistence, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match persistence.load_partition(key)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(T::default()),
    }
}

/// A record filed under a domain and an id
trait DomainRecord {
    fn file_under(&mut self, domain: &str, id: &str);
}

impl DomainRecord for StorageBackup {
    fn file_under(&mut self, domain: &str, id: &str) {
        self.domain = domain.to_string();
        self.id = id.to_string();
    }
}

impl DomainRecord for CookieAccount {
    fn file_under(&mut self, domain: &str, id: &str) {
        self.domain = domain.to_string();
        self.id = id.to_string();
    }
}

fn rekey_records<R: DomainRecord>(
    partition: HashMap<String, BTreeMap<String, R>>,
) -> Result<HashMap<String, BTreeMap<String, R>>> {
    // Sorted so that merges on an id clash resolve the same way every time
    let mut sources: Vec<_> = partition.into_iter().collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rekeyed: HashMap<String, BTreeMap<String, R>> = HashMap::new();
    for (raw_domain, records) in sources {
        if records.is_empty() {
            continue;
        }
        let domain = normalize_domain(&raw_domain)?;
        let target = rekeyed.entry(domain.clone()).or_default();
        for (id, mut record) in records {
            record.file_under(&domain, &id);
            target.insert(id, record);
        }
    }
    Ok(rekeyed)
}

fn rekey_profiles(profiles: ProfilePartition) -> Result<ProfilePartition> {
    profiles
        .into_iter()
        .map(|(name, mut profile)| {
            if name.trim().is_empty() {
                return Err(SnapshotError::EmptyName);
            }
            profile.name = name.clone();
            Ok((name, profile))
        })
        .collect()
}

fn remove_record<R>(
    partition: &mut HashMap<String, BTreeMap<String, R>>,
    domain: &str,
    id: &str,
) {
    if let Some(records) = partition.get_mut(domain) {
        records.remove(id);
        if records.is_empty() {
            partition.remove(domain);
        }
    }
}

fn display_name(name: &str, fallback: &str, now: &chrono::DateTime<Utc>) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("{fallback} {}", now.format("%Y-%m-%d %H:%M:%S"))
    } else {
        name.to_string()
    }
}
