//! Remindly Core Library
//!
//! Local-first reminders for checks/bills and medication schedules.
//!
//! # Architecture
//!
//! ```text
//!   payment form ──► Recurrence Engine ──► next_payment_date ──► payments table
//!
//!   Scheduler tick (1h / 5min / 2min)
//!          │
//!          ▼
//!   ┌──────────────┐   list_payments    ┌─────────────────┐
//!   │  SweepRunner │ ◄───────────────── │  PaymentSource  │
//!   │              │   load/save ledger ┌─────────────────┐
//!   │              │ ◄────────────────► │   LocalStore    │  (SQLite, or JSON file)
//!   └──────┬───────┘                    └─────────────────┘
//!          │ should_notify? ─► record_sent ─► dispatch
//!          ▼
//!     Dispatcher (desktop host / Telegram)
//! ```
//!
//! # Modules
//!
//! - [`recurrence`]: next-occurrence computation and series end conditions
//! - [`ledger`]: notification de-duplication ledger
//! - [`sweep`]: reminder, daily digest and medication sweeps, scheduler
//! - [`db`]: SQLite database layer
//! - [`store`]: storage traits, JSON key-value store, store selection
//! - [`session`]: session service with subscribe/unsubscribe
//! - [`settings`]: user notification settings
//! - [`models`]: domain types

pub mod db;
pub mod ledger;
pub mod models;
pub mod recurrence;
pub mod session;
pub mod settings;
pub mod store;
pub mod sweep;

// Re-export commonly used types
pub use db::Database;
pub use ledger::Ledger;
pub use models::{
    MedicationRecord, Notification, NotificationHistoryEntry, NotificationKind, PaymentRecord,
    RecurrenceRule, RecurringType,
};
pub use recurrence::{compute_next_occurrence, upcoming_occurrences, RecurrenceEnd};
pub use session::{Session, SessionManager, SessionState};
pub use settings::NotificationSettings;
pub use store::{JsonFileStore, LocalStore, PaymentSource, SelectedStore, StoreTier};
pub use sweep::{Dispatcher, DispatchError, Scheduler, ShutdownHandle, SweepKind, SweepReport, SweepRunner};

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] settings::SettingsError),

    #[error("Cannot schedule payment {0}: recurrence rule is incomplete")]
    MalformedRule(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not signed in")]
    SignedOut,
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        CoreError::Store(store::StoreError::Poisoned(e.to_string()))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point used by the daemon and the desktop host.
pub struct RemindlyCore {
    db: Arc<Mutex<Database>>,
    store: SelectedStore,
    session: Arc<SessionManager>,
}

impl RemindlyCore {
    /// Open the database at `db_path` and pick the authoritative local store.
    ///
    /// `kv_path` is the legacy key-value file; it is imported once, or used
    /// directly if the database cannot be written.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        db_path: P,
        kv_path: Q,
        session: Arc<SessionManager>,
    ) -> CoreResult<Self> {
        let kv = JsonFileStore::new(kv_path);
        let db = match Database::open(&db_path) {
            Ok(db) => Arc::new(Mutex::new(db)),
            Err(e) => {
                tracing::warn!(error = %e, "cannot open database for writing, trying read-only");
                let db = Database::open_read_only(&db_path).map_err(|_| e)?;
                return Ok(Self {
                    db: Arc::new(Mutex::new(db)),
                    store: store::select_local_store(None, kv)?,
                    session,
                });
            }
        };
        let store = store::select_local_store(Some(db.clone()), kv)?;
        Ok(Self { db, store, session })
    }

    /// Create with an in-memory database (for testing).
    pub fn open_in_memory(session: Arc<SessionManager>) -> CoreResult<Self> {
        let db = Arc::new(Mutex::new(Database::open_in_memory()?));
        Ok(Self {
            store: SelectedStore::Primary(db.clone()),
            db,
            session,
        })
    }

    /// Build from parts, e.g. with a key-value fallback store.
    pub fn with_store(db: Database, store: SelectedStore, session: Arc<SessionManager>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            store,
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn store_tier(&self) -> StoreTier {
        self.store.tier()
    }

    fn current_user(&self) -> CoreResult<String> {
        self.session.user_id()?.ok_or(CoreError::SignedOut)
    }

    // =========================================================================
    // Payment Operations
    // =========================================================================

    /// Create or update a payment, recomputing its next payment date.
    pub fn save_payment(&self, mut payment: PaymentRecord, now: NaiveDateTime) -> CoreResult<PaymentRecord> {
        payment.next_payment_date = match payment.rule() {
            Some(rule) => Some(
                compute_next_occurrence(&rule, now)
                    .ok_or_else(|| CoreError::MalformedRule(payment.id.clone()))?,
            ),
            None if payment.is_recurring => {
                return Err(CoreError::MalformedRule(payment.id.clone()));
            }
            None => None,
        };
        payment.touch();

        let db = self.db.lock()?;
        if db.get_payment(&payment.id)?.is_some() {
            db.update_payment(&payment)?;
        } else {
            db.insert_payment(&payment)?;
        }
        Ok(payment)
    }

    /// The signed-in user's payments in storage order.
    pub fn list_payments(&self) -> CoreResult<Vec<PaymentRecord>> {
        let user = self.current_user()?;
        Ok(self.db.list_payments(&user)?)
    }

    pub fn set_payment_paid(&self, id: &str, paid: bool) -> CoreResult<()> {
        if !self.db.lock()?.set_payment_paid(id, paid)? {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete_payment(&self, id: &str) -> CoreResult<()> {
        if !self.db.lock()?.delete_payment(id)? {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Recompute next payment dates that are missing or have passed.
    ///
    /// Records whose rule cannot be scheduled are logged and left alone.
    /// Returns the number of records updated.
    pub fn refresh_next_payment_dates(&self, now: NaiveDateTime) -> CoreResult<usize> {
        let user = self.current_user()?;
        let today = now.date();
        let mut updated = 0;

        for payment in self.db.list_payments(&user)? {
            let Some(rule) = payment.rule() else {
                continue;
            };
            if payment.next_payment_date.map_or(false, |next| next >= today) {
                continue;
            }
            match compute_next_occurrence(&rule, now) {
                Some(next) => {
                    if self.db.update_payment_next_date(&payment.id, Some(next))? {
                        updated += 1;
                    }
                }
                None => tracing::warn!(payment = %payment.id, "cannot schedule recurring payment"),
            }
        }
        Ok(updated)
    }

    /// The next `count` dates of a recurring payment, for list-view chips.
    pub fn upcoming_dates(&self, id: &str, now: NaiveDateTime, count: usize) -> CoreResult<Vec<NaiveDate>> {
        let payment = self
            .db
            .lock()?
            .get_payment(id)?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let Some(rule) = payment.rule() else {
            return Ok(payment.payment_date.into_iter().collect());
        };
        let end = RecurrenceEnd::from_payment(&payment);
        Ok(upcoming_occurrences(&rule, now, count)
            .into_iter()
            .take_while(|date| !end.is_exhausted(&rule, payment.payment_date, *date))
            .collect())
    }

    // =========================================================================
    // Medication Operations
    // =========================================================================

    pub fn add_medication(&self, medication: &MedicationRecord) -> CoreResult<()> {
        self.db.lock()?.insert_medication(medication)?;
        Ok(())
    }

    pub fn list_medications(&self) -> CoreResult<Vec<MedicationRecord>> {
        let user = self.current_user()?;
        Ok(self.db.list_medications(&user)?)
    }

    pub fn delete_medication(&self, id: &str) -> CoreResult<()> {
        if !self.db.lock()?.delete_medication(id)? {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn mark_medication_taken(&self, id: &str, taken_at: NaiveDateTime) -> CoreResult<()> {
        if !self.db.lock()?.mark_medication_taken(id, taken_at)? {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn settings(&self) -> CoreResult<NotificationSettings> {
        Ok(self.store.load_settings()?.normalized())
    }

    /// Validate and store new settings.
    pub fn update_settings(&self, settings: &NotificationSettings) -> CoreResult<()> {
        settings.validate()?;
        self.store.save_settings(settings)?;
        Ok(())
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    /// Run one sweep for the signed-in user.
    ///
    /// Returns `None` without touching anything when nobody is signed in.
    pub fn run_sweep(
        &self,
        kind: SweepKind,
        now: NaiveDateTime,
        dispatcher: &dyn Dispatcher,
    ) -> CoreResult<Option<SweepReport>> {
        let Some(user) = self.session.user_id()? else {
            tracing::debug!(sweep = kind.as_str(), "signed out, skipping sweep");
            return Ok(None);
        };
        let runner = SweepRunner::new(&self.db, &self.store, dispatcher);
        Ok(Some(runner.run(kind, &user, now)?))
    }
}
