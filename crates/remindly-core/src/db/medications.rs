//! Medication database operations.

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, parse_date, Database, DbError, DbResult};
use crate::models::MedicationRecord;

const MEDICATION_COLUMNS: &str = r#"
    id, user_id, name, dosage, times, active, start_date, end_date,
    last_taken, created_at, updated_at
"#;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl Database {
    /// Insert a new medication at the end of the user's list.
    pub fn insert_medication(&self, medication: &MedicationRecord) -> DbResult<()> {
        let times_json = serde_json::to_string(&medication.times)?;

        self.conn.execute(
            r#"
            INSERT INTO medications (
                id, user_id, name, dosage, times, active, start_date, end_date,
                last_taken, position, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM medications WHERE user_id = ?2),
                ?10, ?11
            )
            "#,
            params![
                medication.id,
                medication.user_id,
                medication.name,
                medication.dosage,
                times_json,
                medication.active,
                format_date(medication.start_date),
                format_date(medication.end_date),
                medication.last_taken.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                medication.created_at,
                medication.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Record that a dose was taken.
    pub fn mark_medication_taken(&self, id: &str, taken_at: NaiveDateTime) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medications SET last_taken = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, taken_at.format(TIMESTAMP_FORMAT).to_string()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a medication by ID.
    pub fn get_medication(&self, id: &str) -> DbResult<Option<MedicationRecord>> {
        let sql = format!("SELECT {} FROM medications WHERE id = ?", MEDICATION_COLUMNS);
        self.conn
            .query_row(&sql, [id], MedicationRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a user's medications in storage order.
    pub fn list_medications(&self, user_id: &str) -> DbResult<Vec<MedicationRecord>> {
        let sql = format!(
            "SELECT {} FROM medications WHERE user_id = ? ORDER BY position, created_at",
            MEDICATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], MedicationRow::from_row)?;

        let mut medications = Vec::new();
        for row in rows {
            medications.push(row?.try_into()?);
        }
        Ok(medications)
    }

    /// Delete a medication.
    pub fn delete_medication(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medications WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

struct MedicationRow {
    id: String,
    user_id: String,
    name: String,
    dosage: Option<String>,
    times: String,
    active: bool,
    start_date: Option<String>,
    end_date: Option<String>,
    last_taken: Option<String>,
    created_at: String,
    updated_at: String,
}

impl MedicationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            dosage: row.get(3)?,
            times: row.get(4)?,
            active: row.get(5)?,
            start_date: row.get(6)?,
            end_date: row.get(7)?,
            last_taken: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<MedicationRow> for MedicationRecord {
    type Error = DbError;

    fn try_from(row: MedicationRow) -> Result<Self, Self::Error> {
        let times: Vec<String> = serde_json::from_str(&row.times)?;
        let last_taken = row
            .last_taken
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                    .map_err(|e| DbError::Constraint(format!("Invalid timestamp {}: {}", s, e)))
            })
            .transpose()?;

        Ok(MedicationRecord {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            dosage: row.dosage,
            times,
            active: row.active,
            start_date: parse_date(row.start_date)?,
            end_date: parse_date(row.end_date)?,
            last_taken,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
