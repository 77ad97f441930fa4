//! Settings and sync-state database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::settings::NotificationSettings;

/// `sync_state` key set once the legacy key-value file has been imported.
pub const KV_MIGRATED_KEY: &str = "kv_migrated_at";

impl Database {
    /// Load stored settings, if any were saved.
    pub fn load_settings(&self) -> DbResult<Option<NotificationSettings>> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT value FROM settings WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        value
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    /// Store settings, replacing any previous value.
    pub fn save_settings(&self, settings: &NotificationSettings) -> DbResult<()> {
        let json = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (id, value, updated_at) VALUES (1, ?, datetime('now'))",
            [json],
        )?;
        Ok(())
    }

    /// Get sync state value.
    pub fn get_sync_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set sync state value.
    pub fn set_sync_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Check that the database accepts writes.
    pub fn probe_writable(&self) -> DbResult<()> {
        self.set_sync_state("last_opened_at", &chrono::Utc::now().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_settings().unwrap().is_none());

        let settings = NotificationSettings {
            reminder_days: 7,
            telegram_enabled: true,
            telegram_chat_id: Some("12345".into()),
            ..Default::default()
        };
        db.save_settings(&settings).unwrap();
        assert_eq!(db.load_settings().unwrap(), Some(settings));
    }

    #[test]
    fn test_sync_state() {
        let db = Database::open_in_memory().unwrap();

        // Default value from schema
        assert_eq!(db.get_sync_state(KV_MIGRATED_KEY).unwrap(), Some(String::new()));

        db.set_sync_state(KV_MIGRATED_KEY, "2024-01-15T10:00:00Z").unwrap();
        assert_eq!(
            db.get_sync_state(KV_MIGRATED_KEY).unwrap(),
            Some("2024-01-15T10:00:00Z".to_string())
        );
        assert_eq!(db.get_sync_state("missing").unwrap(), None);
    }

    #[test]
    fn test_probe_writable() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.probe_writable().is_ok());
        assert!(db.get_sync_state("last_opened_at").unwrap().is_some());
    }
}
