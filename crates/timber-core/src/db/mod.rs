// ============================================================================
// LocalStore — Embedded Database (redb)
// ============================================================================
// Durable storage for simulated mode: the simulated current user and the
// listings created while offline, plus short-lived session flags.
// Default path: ~/.timber/timber.redb (override via TIMBER_DB_PATH env var)
// ============================================================================

pub mod types;

pub use types::StoreStats;

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{Listing, User};

// Table definitions
const LOCAL_STORAGE: TableDefinition<&str, &str> = TableDefinition::new("local_storage");
const SESSION_STORAGE: TableDefinition<&str, &str> = TableDefinition::new("session_storage");

/// Whole-object JSON record of the simulated current user
pub const LOCAL_USER_KEY: &str = "timber_sim_user";
/// JSON array of listings created in simulated mode, newest first
pub const LOCAL_LISTINGS_KEY: &str = "timber_sim_listings";
/// JSON array of listing ids a hunter has saved
pub const SAVED_LISTINGS_KEY: &str = "timber_saved_listings";
/// Session-scoped "force simulation" override
pub const FORCE_SIMULATION_KEY: &str = "TIMBER_FORCE_SIMULATION";

/// Which storage area a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Survives reloads indefinitely
    Local,
    /// Survives reloads until the session is reset
    Session,
}

impl StorageArea {
    fn table(&self) -> TableDefinition<'static, &'static str, &'static str> {
        match self {
            StorageArea::Local => LOCAL_STORAGE,
            StorageArea::Session => SESSION_STORAGE,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StorageArea::Local => "local",
            StorageArea::Session => "session",
        }
    }
}

/// Embedded key-value store backing simulated mode
pub struct LocalStore {
    db: Database,
    path: PathBuf,
}

impl LocalStore {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses TIMBER_DB_PATH env var or ~/.timber/timber.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_db_path()?,
        };

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create {}: {}", parent.display(), e))?;
            }
        }

        info!("Opening local store at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(LOCAL_STORAGE)
                .map_err(|e| anyhow!("Failed to create local table: {}", e))?;
            let _ = write_txn
                .open_table(SESSION_STORAGE)
                .map_err(|e| anyhow!("Failed to create session table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Raw Key-Value Operations
    // ========================================================================

    pub fn get_item(&self, area: StorageArea, key: &str) -> Result<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn
            .open_table(area.table())
            .map_err(|e| anyhow!("Failed to open {} table: {}", area.name(), e))?;

        let value = table
            .get(key)
            .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    pub fn set_item(&self, area: StorageArea, key: &str, value: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn
                .open_table(area.table())
                .map_err(|e| anyhow!("Failed to open {} table: {}", area.name(), e))?;
            table
                .insert(key, value)
                .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored {} record: {}", area.name(), key);
        Ok(())
    }

    pub fn remove_item(&self, area: StorageArea, key: &str) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(area.table())
                .map_err(|e| anyhow!("Failed to open {} table: {}", area.name(), e))?;
            removed = table
                .remove(key)
                .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Removed {} record: {}", area.name(), key);
        }
        Ok(removed)
    }

    /// Drop every record in one storage area
    pub fn clear(&self, area: StorageArea) -> Result<usize> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let count;
        {
            let mut table = write_txn
                .open_table(area.table())
                .map_err(|e| anyhow!("Failed to open {} table: {}", area.name(), e))?;
            let keys: Vec<String> = table
                .iter()
                .map_err(|e| anyhow!("Failed to iterate {} table: {}", area.name(), e))?
                .filter_map(|entry| entry.ok().map(|(k, _)| k.value().to_string()))
                .collect();
            for key in &keys {
                table
                    .remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?;
            }
            count = keys.len();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit clear: {}", e))?;

        info!("Cleared {} {} records", count, area.name());
        Ok(count)
    }

    /// Read and decode a JSON record. Missing, unreadable, or malformed
    /// records all come back as None.
    fn read_json<T: DeserializeOwned>(&self, area: StorageArea, key: &str) -> Option<T> {
        let raw = match self.get_item(area, key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {}: {:#} - treating as empty", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Malformed {} record: {} - treating as empty", key, e);
                None
            }
        }
    }

    // ========================================================================
    // Simulated User
    // ========================================================================

    /// Overwrite the simulated current user; None clears it
    pub fn save_simulated_user(&self, user: Option<&User>) -> Result<()> {
        match user {
            Some(user) => {
                let value = serde_json::to_string(user)
                    .map_err(|e| anyhow!("Failed to serialize user: {}", e))?;
                self.set_item(StorageArea::Local, LOCAL_USER_KEY, &value)
            }
            None => self
                .remove_item(StorageArea::Local, LOCAL_USER_KEY)
                .map(|_| ()),
        }
    }

    pub fn simulated_user(&self) -> Option<User> {
        self.read_json(StorageArea::Local, LOCAL_USER_KEY)
    }

    // ========================================================================
    // Simulated Listings
    // ========================================================================

    /// Prepend a listing. Returns false without writing when the id is
    /// already present.
    pub fn save_simulated_listing(&self, listing: &Listing) -> Result<bool> {
        let existing = self.simulated_listings();
        if existing.iter().any(|l| l.id == listing.id) {
            debug!("Listing {} already stored, skipping", listing.id);
            return Ok(false);
        }

        let mut listings = Vec::with_capacity(existing.len() + 1);
        listings.push(listing.clone());
        listings.extend(existing);
        self.write_listings(&listings)?;

        debug!("Stored simulated listing: {}", listing.id);
        Ok(true)
    }

    pub fn simulated_listings(&self) -> Vec<Listing> {
        self.read_json(StorageArea::Local, LOCAL_LISTINGS_KEY)
            .unwrap_or_default()
    }

    /// Apply `update` to the stored listing with this id. Returns false when
    /// no stored listing matches.
    pub fn update_simulated_listing<F>(&self, listing_id: &str, update: F) -> Result<bool>
    where
        F: FnOnce(&mut Listing),
    {
        let mut listings = self.simulated_listings();
        let Some(listing) = listings.iter_mut().find(|l| l.id == listing_id) else {
            return Ok(false);
        };
        update(listing);
        self.write_listings(&listings)?;
        debug!("Updated simulated listing: {}", listing_id);
        Ok(true)
    }

    pub fn delete_simulated_listing(&self, listing_id: &str) -> Result<bool> {
        let mut listings = self.simulated_listings();
        let before = listings.len();
        listings.retain(|l| l.id != listing_id);
        if listings.len() == before {
            return Ok(false);
        }
        self.write_listings(&listings)?;
        debug!("Deleted simulated listing: {}", listing_id);
        Ok(true)
    }

    fn write_listings(&self, listings: &[Listing]) -> Result<()> {
        let value = serde_json::to_string(listings)
            .map_err(|e| anyhow!("Failed to serialize listings: {}", e))?;
        self.set_item(StorageArea::Local, LOCAL_LISTINGS_KEY, &value)
    }

    // ========================================================================
    // Saved Listings
    // ========================================================================

    pub fn saved_listing_ids(&self) -> Vec<String> {
        self.read_json(StorageArea::Local, SAVED_LISTINGS_KEY)
            .unwrap_or_default()
    }

    pub fn set_saved_listing_ids(&self, ids: &[String]) -> Result<()> {
        let value = serde_json::to_string(ids)
            .map_err(|e| anyhow!("Failed to serialize saved listings: {}", e))?;
        self.set_item(StorageArea::Local, SAVED_LISTINGS_KEY, &value)
    }

    // ========================================================================
    // Session Flags
    // ========================================================================

    pub fn simulation_forced(&self) -> bool {
        match self.get_item(StorageArea::Session, FORCE_SIMULATION_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("Failed to read simulation override: {:#}", e);
                false
            }
        }
    }

    pub fn set_simulation_forced(&self, force: bool) -> Result<()> {
        let value = if force { "true" } else { "false" };
        self.set_item(StorageArea::Session, FORCE_SIMULATION_KEY, value)?;
        info!("Simulation override set to {}", value);
        Ok(())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<StoreStats> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let local = read_txn
            .open_table(LOCAL_STORAGE)
            .map_err(|e| anyhow!("Failed to open local table: {}", e))?
            .len()
            .map_err(|e| anyhow!("Failed to count local records: {}", e))?;
        let session = read_txn
            .open_table(SESSION_STORAGE)
            .map_err(|e| anyhow!("Failed to open session table: {}", e))?
            .len()
            .map_err(|e| anyhow!("Failed to count session records: {}", e))?;

        Ok(StoreStats {
            local_records: local as usize,
            session_records: session as usize,
            simulated_listings: self.simulated_listings().len(),
            has_simulated_user: self.simulated_user().is_some(),
            simulation_forced: self.simulation_forced(),
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var("TIMBER_DB_PATH") {
        if !env_path.trim().is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".timber").join("timber.redb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(Some(&dir.path().join("timber.redb"))).unwrap();
        (dir, store)
    }

    #[test]
    fn test_empty_store_reads() {
        let (_dir, store) = open_temp();
        assert!(store.simulated_user().is_none());
        assert!(store.simulated_listings().is_empty());
        assert!(!store.simulation_forced());
    }

    #[test]
    fn test_user_overwrite_and_clear() {
        let (_dir, store) = open_temp();
        let mut user = User {
            id: "mock-hunter-abc12".into(),
            name: "Travis Hunter".into(),
            email: "hunter@example.com".into(),
            role: None,
            is_member: false,
        };
        store.save_simulated_user(Some(&user)).unwrap();
        assert_eq!(store.simulated_user(), Some(user.clone()));

        user.is_member = true;
        store.save_simulated_user(Some(&user)).unwrap();
        assert!(store.simulated_user().unwrap().is_member);

        store.save_simulated_user(None).unwrap();
        assert!(store.simulated_user().is_none());
    }

    #[test]
    fn test_listing_insert_is_idempotent_on_id() {
        let (_dir, store) = open_temp();
        let listing = seed::seed_listings().remove(0);

        assert!(store.save_simulated_listing(&listing).unwrap());
        assert!(!store.save_simulated_listing(&listing).unwrap());

        let stored = store.simulated_listings();
        assert_eq!(stored.iter().filter(|l| l.id == listing.id).count(), 1);
    }

    #[test]
    fn test_listings_prepend_newest_first() {
        let (_dir, store) = open_temp();
        let seeds = seed::seed_listings();
        store.save_simulated_listing(&seeds[0]).unwrap();
        store.save_simulated_listing(&seeds[1]).unwrap();

        let ids: Vec<_> = store.simulated_listings().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["2".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_malformed_records_fail_soft() {
        let (_dir, store) = open_temp();
        store
            .set_item(StorageArea::Local, LOCAL_LISTINGS_KEY, "{not json")
            .unwrap();
        store
            .set_item(StorageArea::Local, LOCAL_USER_KEY, "[1, 2, 3]")
            .unwrap();

        assert!(store.simulated_listings().is_empty());
        assert!(store.simulated_user().is_none());

        // A fresh insert recovers the record
        let listing = seed::seed_listings().remove(2);
        assert!(store.save_simulated_listing(&listing).unwrap());
        assert_eq!(store.simulated_listings().len(), 1);
    }

    #[test]
    fn test_update_and_delete_listing() {
        let (_dir, store) = open_temp();
        let mut listing = seed::seed_listings().remove(2);
        listing.is_verified = false;
        store.save_simulated_listing(&listing).unwrap();

        assert!(store
            .update_simulated_listing("3", |l| l.is_verified = true)
            .unwrap());
        assert!(store.simulated_listings()[0].is_verified);
        assert!(!store.update_simulated_listing("missing", |_| {}).unwrap());

        assert!(store.delete_simulated_listing("3").unwrap());
        assert!(!store.delete_simulated_listing("3").unwrap());
        assert!(store.simulated_listings().is_empty());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timber.redb");
        let listing = seed::seed_listings().remove(1);
        {
            let store = LocalStore::open(Some(&path)).unwrap();
            store.save_simulated_listing(&listing).unwrap();
            store.set_simulation_forced(true).unwrap();
        }
        let store = LocalStore::open(Some(&path)).unwrap();
        assert_eq!(store.simulated_listings(), vec![listing]);
        assert!(store.simulation_forced());
    }

    #[test]
    fn test_clear_session_area_keeps_local_records() {
        let (_dir, store) = open_temp();
        store.set_simulation_forced(true).unwrap();
        store
            .save_simulated_listing(&seed::seed_listings().remove(0))
            .unwrap();

        assert_eq!(store.clear(StorageArea::Session).unwrap(), 1);
        assert!(!store.simulation_forced());
        assert_eq!(store.simulated_listings().len(), 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_records, 0);
        assert_eq!(stats.local_records, 1);
        assert_eq!(stats.simulated_listings, 1);
        assert!(!stats.has_simulated_user);
    }
}
