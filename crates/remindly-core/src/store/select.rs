//! Startup selection of the authoritative local store.

use std::sync::{Arc, Mutex};

use super::{JsonFileStore, LocalStore, StoreResult};
use crate::db::{Database, KV_MIGRATED_KEY};
use crate::ledger::Ledger;
use crate::settings::NotificationSettings;

/// Which tier won the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTier {
    Primary,
    Fallback,
}

/// The single store that owns the ledger and settings for this run.
pub enum SelectedStore {
    Primary(Arc<Mutex<Database>>),
    Fallback(JsonFileStore),
}

impl SelectedStore {
    pub fn tier(&self) -> StoreTier {
        match self {
            SelectedStore::Primary(_) => StoreTier::Primary,
            SelectedStore::Fallback(_) => StoreTier::Fallback,
        }
    }
}

impl LocalStore for SelectedStore {
    fn load_ledger(&self) -> StoreResult<Ledger> {
        match self {
            SelectedStore::Primary(db) => db.load_ledger(),
            SelectedStore::Fallback(kv) => kv.load_ledger(),
        }
    }

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()> {
        match self {
            SelectedStore::Primary(db) => db.save_ledger(ledger),
            SelectedStore::Fallback(kv) => kv.save_ledger(ledger),
        }
    }

    fn load_settings(&self) -> StoreResult<NotificationSettings> {
        match self {
            SelectedStore::Primary(db) => db.load_settings(),
            SelectedStore::Fallback(kv) => kv.load_settings(),
        }
    }

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        match self {
            SelectedStore::Primary(db) => db.save_settings(settings),
            SelectedStore::Fallback(kv) => kv.save_settings(settings),
        }
    }
}

/// What the one-time import brought over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub entries_imported: usize,
    pub settings_imported: bool,
    /// True when an earlier run already imported the file
    pub already_migrated: bool,
}

/// Pick the authoritative store.
///
/// The database wins when present and writable; the key-value file is then
/// imported once. An unreadable key-value file is logged and skipped.
/// Otherwise the key-value file is used on its own.
pub fn select_local_store(
    primary: Option<Arc<Mutex<Database>>>,
    fallback: JsonFileStore,
) -> StoreResult<SelectedStore> {
    let Some(db) = primary else {
        tracing::warn!(path = %fallback.path().display(), "no database, using key-value store");
        return Ok(SelectedStore::Fallback(fallback));
    };

    let writable = db.lock()?.probe_writable();
    if let Err(e) = writable {
        tracing::warn!(error = %e, path = %fallback.path().display(), "database not writable, using key-value store");
        return Ok(SelectedStore::Fallback(fallback));
    }

    let migrated = {
        let guard = db.lock()?;
        migrate_key_value_store(&guard, &fallback)
    };
    match migrated {
        Ok(report) if !report.already_migrated => tracing::info!(
            entries = report.entries_imported,
            settings = report.settings_imported,
            "imported key-value store into database"
        ),
        Ok(_) => {}
        // left unmarked so the next start tries again
        Err(e) => tracing::warn!(
            error = %e,
            path = %fallback.path().display(),
            "cannot import key-value store, continuing with database"
        ),
    }
    Ok(SelectedStore::Primary(db))
}

/// Copy the key-value file's ledger and settings into the database, once.
///
/// Data already in the database is never overwritten.
pub fn migrate_key_value_store(db: &Database, kv: &JsonFileStore) -> StoreResult<MigrationReport> {
    let migrated_at = db.get_sync_state(KV_MIGRATED_KEY)?;
    if migrated_at.map_or(false, |v| !v.is_empty()) {
        return Ok(MigrationReport {
            already_migrated: true,
            ..Default::default()
        });
    }

    let mut report = MigrationReport::default();
    if kv.exists() {
        let ledger = kv.load_ledger()?;
        if !ledger.is_empty() && db.load_history()?.is_empty() {
            db.save_history(&ledger)?;
            report.entries_imported = ledger.len();
        }

        if let Some(settings) = kv.stored_settings()? {
            if db.load_settings()?.is_none() {
                db.save_settings(&settings)?;
                report.settings_imported = true;
            }
        }
    }

    db.set_sync_state(KV_MIGRATED_KEY, &chrono::Utc::now().to_rfc3339())?;
    Ok(report)
}
