//! Payment database operations.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, parse_date, Database, DbError, DbResult};
use crate::models::{PaymentRecord, RecurringType};

const PAYMENT_COLUMNS: &str = r#"
    id, user_id, title, amount, payment_date, is_paid, is_recurring,
    recurring_type, recurring_day, recurring_days, recurring_end_count,
    recurring_end_months, recurring_end_date, next_payment_date,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new payment at the end of the user's list.
    pub fn insert_payment(&self, payment: &PaymentRecord) -> DbResult<()> {
        let recurring_days_json = serde_json::to_string(&payment.recurring_days)?;

        self.conn.execute(
            r#"
            INSERT INTO payments (
                id, user_id, title, amount, payment_date, is_paid, is_recurring,
                recurring_type, recurring_day, recurring_days, recurring_end_count,
                recurring_end_months, recurring_end_date, next_payment_date,
                position, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM payments WHERE user_id = ?2),
                ?15, ?16
            )
            "#,
            params![
                payment.id,
                payment.user_id,
                payment.title,
                payment.amount,
                format_date(payment.payment_date),
                payment.is_paid,
                payment.is_recurring,
                payment.recurring_type.map(|t| t.as_str()),
                payment.recurring_day,
                recurring_days_json,
                payment.recurring_end_count,
                payment.recurring_end_months,
                format_date(payment.recurring_end_date),
                format_date(payment.next_payment_date),
                payment.created_at,
                payment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing payment. Storage order is kept.
    pub fn update_payment(&self, payment: &PaymentRecord) -> DbResult<bool> {
        let recurring_days_json = serde_json::to_string(&payment.recurring_days)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE payments SET
                title = ?2,
                amount = ?3,
                payment_date = ?4,
                is_paid = ?5,
                is_recurring = ?6,
                recurring_type = ?7,
                recurring_day = ?8,
                recurring_days = ?9,
                recurring_end_count = ?10,
                recurring_end_months = ?11,
                recurring_end_date = ?12,
                next_payment_date = ?13,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                payment.id,
                payment.title,
                payment.amount,
                format_date(payment.payment_date),
                payment.is_paid,
                payment.is_recurring,
                payment.recurring_type.map(|t| t.as_str()),
                payment.recurring_day,
                recurring_days_json,
                payment.recurring_end_count,
                payment.recurring_end_months,
                format_date(payment.recurring_end_date),
                format_date(payment.next_payment_date),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Store a freshly computed next payment date.
    pub fn update_payment_next_date(&self, id: &str, next: Option<NaiveDate>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE payments SET next_payment_date = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, format_date(next)],
        )?;
        Ok(rows_affected > 0)
    }

    /// Mark a payment as paid or unpaid.
    pub fn set_payment_paid(&self, id: &str, paid: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE payments SET is_paid = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, paid],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a payment by ID.
    pub fn get_payment(&self, id: &str) -> DbResult<Option<PaymentRecord>> {
        let sql = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
        self.conn
            .query_row(&sql, [id], PaymentRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List a user's payments in storage order.
    pub fn list_payments(&self, user_id: &str) -> DbResult<Vec<PaymentRecord>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE user_id = ? ORDER BY position, created_at",
            PAYMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], PaymentRow::from_row)?;

        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?.try_into()?);
        }
        Ok(payments)
    }

    /// Delete a payment.
    pub fn delete_payment(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM payments WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct PaymentRow {
    id: String,
    user_id: String,
    title: String,
    amount: f64,
    payment_date: Option<String>,
    is_paid: bool,
    is_recurring: bool,
    recurring_type: Option<String>,
    recurring_day: Option<u32>,
    recurring_days: String,
    recurring_end_count: Option<u32>,
    recurring_end_months: Option<u32>,
    recurring_end_date: Option<String>,
    next_payment_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PaymentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            amount: row.get(3)?,
            payment_date: row.get(4)?,
            is_paid: row.get(5)?,
            is_recurring: row.get(6)?,
            recurring_type: row.get(7)?,
            recurring_day: row.get(8)?,
            recurring_days: row.get(9)?,
            recurring_end_count: row.get(10)?,
            recurring_end_months: row.get(11)?,
            recurring_end_date: row.get(12)?,
            next_payment_date: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let recurring_days: BTreeSet<u32> = serde_json::from_str(&row.recurring_days)?;
        let recurring_type = row
            .recurring_type
            .map(|s| {
                RecurringType::parse(&s)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown recurring type: {}", s)))
            })
            .transpose()?;

        Ok(PaymentRecord {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            amount: row.amount,
            payment_date: parse_date(row.payment_date)?,
            is_paid: row.is_paid,
            is_recurring: row.is_recurring,
            recurring_type,
            recurring_day: row.recurring_day,
            recurring_days,
            recurring_end_count: row.recurring_end_count,
            recurring_end_months: row.recurring_end_months,
            recurring_end_date: parse_date(row.recurring_end_date)?,
            next_payment_date: parse_date(row.next_payment_date)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
