//! JSON key-value file store.
//!
//! The file holds a single JSON object. Remindly owns two keys,
//! `notificationHistory` and `settings`; any other keys are preserved.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{LocalStore, StoreResult};
use crate::ledger::Ledger;
use crate::settings::NotificationSettings;

pub const HISTORY_KEY: &str = "notificationHistory";
pub const SETTINGS_KEY: &str = "settings";

/// Local key-value settings file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the whole document. A missing file reads as empty.
    fn read(&self) -> StoreResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            other => {
                tracing::warn!(path = %self.path.display(), kind = ?other, "key-value file is not an object, starting fresh");
                Ok(Map::new())
            }
        }
    }

    /// Write the document through a temporary file so readers never see a partial write.
    fn write(&self, map: &Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.read()?.remove(key))
    }

    pub fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut map = self.read()?;
        map.insert(key.to_string(), value);
        self.write(&map)
    }

    /// Stored settings without falling back to defaults.
    pub fn stored_settings(&self) -> StoreResult<Option<NotificationSettings>> {
        self.get(SETTINGS_KEY)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }
}

impl LocalStore for JsonFileStore {
    fn load_ledger(&self) -> StoreResult<Ledger> {
        match self.get(HISTORY_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Ledger::new()),
        }
    }

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()> {
        self.set(HISTORY_KEY, serde_json::to_value(ledger)?)
    }

    fn load_settings(&self) -> StoreResult<NotificationSettings> {
        Ok(self.stored_settings()?.unwrap_or_default())
    }

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        self.set(SETTINGS_KEY, serde_json::to_value(settings)?)
    }
}
