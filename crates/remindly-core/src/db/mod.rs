//! Database layer for remindly.

mod schema;
mod payments;
mod medications;
mod history;
mod state;

pub use schema::*;
pub use state::*;

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open an existing database without write access. The schema is not touched.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse an optional `YYYY-MM-DD` column.
pub(crate) fn parse_date(value: Option<String>) -> DbResult<Option<chrono::NaiveDate>> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| {
            chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| DbError::Constraint(format!("Invalid date {}: {}", s, e)))
        })
        .transpose()
}

pub(crate) fn format_date(value: Option<chrono::NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"payments".to_string()));
        assert!(tables.contains(&"medications".to_string()));
        assert!(tables.contains(&"notification_history".to_string()));
        assert!(tables.contains(&"settings".to_string()));
        assert!(tables.contains(&"sync_state".to_string()));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remindly.db");
        Database::open(&path).unwrap();

        let db = Database::open_read_only(&path).unwrap();
        assert!(db.get_sync_state(KV_MIGRATED_KEY).unwrap().is_some());
        assert!(db.probe_writable().is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(None).unwrap(), None);
        assert_eq!(parse_date(Some(String::new())).unwrap(), None);
        assert_eq!(
            parse_date(Some("2024-02-29".into())).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert!(parse_date(Some("2023-02-29".into())).is_err());
    }
}
