//! Storage seams used by the sweeps.
//!
//! - [`PaymentSource`]: where payment and medication records come from.
//! - [`LocalStore`]: where the notification ledger and settings live.
//!
//! One authoritative [`LocalStore`] is chosen at startup by
//! [`select_local_store`]: the SQLite database when it opens and accepts
//! writes, otherwise the JSON key-value file. When SQLite wins, the legacy
//! key-value file is imported exactly once.

mod kv;
mod select;

pub use kv::*;
pub use select::*;

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::ledger::Ledger;
use crate::models::{MedicationRecord, PaymentRecord};
use crate::settings::NotificationSettings;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to a user's payments and medications.
pub trait PaymentSource {
    fn list_payments(&self, user_id: &str) -> StoreResult<Vec<PaymentRecord>>;

    fn list_medications(&self, user_id: &str) -> StoreResult<Vec<MedicationRecord>>;

    /// Persist a recomputed next payment date. Returns false if the record is gone.
    fn update_payment_next_date(&self, id: &str, next: Option<NaiveDate>) -> StoreResult<bool>;
}

/// Durable home of the notification ledger and settings.
pub trait LocalStore {
    fn load_ledger(&self) -> StoreResult<Ledger>;

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()>;

    /// Stored settings, or defaults when none were saved.
    fn load_settings(&self) -> StoreResult<NotificationSettings>;

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()>;
}

impl PaymentSource for Database {
    fn list_payments(&self, user_id: &str) -> StoreResult<Vec<PaymentRecord>> {
        Ok(Database::list_payments(self, user_id)?)
    }

    fn list_medications(&self, user_id: &str) -> StoreResult<Vec<MedicationRecord>> {
        Ok(Database::list_medications(self, user_id)?)
    }

    fn update_payment_next_date(&self, id: &str, next: Option<NaiveDate>) -> StoreResult<bool> {
        Ok(Database::update_payment_next_date(self, id, next)?)
    }
}

impl LocalStore for Database {
    fn load_ledger(&self) -> StoreResult<Ledger> {
        Ok(self.load_history()?)
    }

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()> {
        Ok(self.save_history(ledger)?)
    }

    fn load_settings(&self) -> StoreResult<NotificationSettings> {
        Ok(Database::load_settings(self)?.unwrap_or_default())
    }

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        Ok(Database::save_settings(self, settings)?)
    }
}

// Shared handles lock per call, so a sweep never holds the lock across
// two store operations.

impl PaymentSource for Mutex<Database> {
    fn list_payments(&self, user_id: &str) -> StoreResult<Vec<PaymentRecord>> {
        PaymentSource::list_payments(&*self.lock()?, user_id)
    }

    fn list_medications(&self, user_id: &str) -> StoreResult<Vec<MedicationRecord>> {
        PaymentSource::list_medications(&*self.lock()?, user_id)
    }

    fn update_payment_next_date(&self, id: &str, next: Option<NaiveDate>) -> StoreResult<bool> {
        PaymentSource::update_payment_next_date(&*self.lock()?, id, next)
    }
}

impl LocalStore for Mutex<Database> {
    fn load_ledger(&self) -> StoreResult<Ledger> {
        self.lock()?.load_ledger()
    }

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()> {
        self.lock()?.save_ledger(ledger)
    }

    fn load_settings(&self) -> StoreResult<NotificationSettings> {
        LocalStore::load_settings(&*self.lock()?)
    }

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        LocalStore::save_settings(&*self.lock()?, settings)
    }
}

impl<T: PaymentSource + ?Sized> PaymentSource for Arc<T> {
    fn list_payments(&self, user_id: &str) -> StoreResult<Vec<PaymentRecord>> {
        (**self).list_payments(user_id)
    }

    fn list_medications(&self, user_id: &str) -> StoreResult<Vec<MedicationRecord>> {
        (**self).list_medications(user_id)
    }

    fn update_payment_next_date(&self, id: &str, next: Option<NaiveDate>) -> StoreResult<bool> {
        (**self).update_payment_next_date(id, next)
    }
}

impl<T: LocalStore + ?Sized> LocalStore for Arc<T> {
    fn load_ledger(&self) -> StoreResult<Ledger> {
        (**self).load_ledger()
    }

    fn save_ledger(&self, ledger: &Ledger) -> StoreResult<()> {
        (**self).save_ledger(ledger)
    }

    fn load_settings(&self) -> StoreResult<NotificationSettings> {
        (**self).load_settings()
    }

    fn save_settings(&self, settings: &NotificationSettings) -> StoreResult<()> {
        (**self).save_settings(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    #[test]
    fn test_database_settings_default_when_unset() {
        let db = Database::open_in_memory().unwrap();
        let settings = LocalStore::load_settings(&db).unwrap();
        assert_eq!(settings, NotificationSettings::default());
    }

    #[test]
    fn test_shared_database_ledger() {
        let shared = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let mut ledger = shared.load_ledger().unwrap();
        ledger.record_sent("p1", NotificationKind::DueToday, day, day.and_hms_opt(9, 0, 0).unwrap());
        shared.save_ledger(&ledger).unwrap();

        let reloaded = shared.load_ledger().unwrap();
        assert!(!reloaded.should_notify("p1", NotificationKind::DueToday, day));
    }
}
