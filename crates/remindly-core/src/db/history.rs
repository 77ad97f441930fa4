//! Notification history (ledger) persistence.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::params;

use super::{Database, DbError, DbResult};
use crate::ledger::Ledger;
use crate::models::{NotificationHistoryEntry, NotificationKind};

const SENT_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl Database {
    /// Load the full notification history in insertion order.
    pub fn load_history(&self) -> DbResult<Ledger> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT subject_id, kind, sent_at, reference_date
            FROM notification_history
            ORDER BY seq
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(HistoryRow {
                subject_id: row.get(0)?,
                kind: row.get(1)?,
                sent_at: row.get(2)?,
                reference_date: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(Ledger::from_entries(entries))
    }

    /// Replace the stored history with `ledger`, atomically.
    pub fn save_history(&self, ledger: &Ledger) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM notification_history", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO notification_history (subject_id, kind, sent_at, reference_date)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for entry in ledger.entries() {
                stmt.execute(params![
                    entry.subject_id,
                    entry.kind.as_str(),
                    entry.sent_at.format(SENT_AT_FORMAT).to_string(),
                    entry.reference_date.format("%Y-%m-%d").to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

struct HistoryRow {
    subject_id: String,
    kind: String,
    sent_at: String,
    reference_date: String,
}

impl TryFrom<HistoryRow> for NotificationHistoryEntry {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown notification kind: {}", row.kind)))?;
        let sent_at = NaiveDateTime::parse_from_str(&row.sent_at, SENT_AT_FORMAT)
            .map_err(|e| DbError::Constraint(format!("Invalid sent_at {}: {}", row.sent_at, e)))?;
        let reference_date = NaiveDate::parse_from_str(&row.reference_date, "%Y-%m-%d")
            .map_err(|e| {
                DbError::Constraint(format!("Invalid reference_date {}: {}", row.reference_date, e))
            })?;

        Ok(NotificationHistoryEntry {
            subject_id: row.subject_id,
            kind,
            sent_at,
            reference_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_history() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_history() {
        let db = Database::open_in_memory().unwrap();

        let mut ledger = Ledger::new();
        ledger.record_sent("p1", NotificationKind::Reminder, at(5, 0).date(), at(2, 9));
        ledger.record_sent("p1", NotificationKind::DueToday, at(5, 0).date(), at(5, 9));
        db.save_history(&ledger).unwrap();
        assert_eq!(db.load_history().unwrap(), ledger);

        let mut smaller = Ledger::new();
        smaller.record_sent("daily-digest", NotificationKind::Daily, at(6, 0).date(), at(6, 9));
        db.save_history(&smaller).unwrap();

        let loaded = db.load_history().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].kind, NotificationKind::Daily);
    }
}
