//! Timer-driven notification sweeps.
//!
//! Three independent sweeps evaluate due records and dispatch notifications:
//!
//! | Sweep        | Interval | Fires when                                         |
//! |--------------|----------|----------------------------------------------------|
//! | reminder     | 1 h      | unpaid payment due today or within `reminder_days` |
//! | daily digest | 5 min    | within ±5 min of `daily_time`, once per day        |
//! | medication   | 2 min    | pre-reminder, ±2 min of a dose, or 30 min late     |
//!
//! Every notification is checked against the [`Ledger`] first and recorded
//! before it is dispatched. A failed dispatch is logged and not retried; a
//! failed ledger save is logged and the notification still counts as sent.

mod medication;
mod messages;
mod payments;
mod scheduler;

pub use medication::*;
pub use messages::DigestLine;
pub use payments::*;
pub use scheduler::*;

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Ledger;
use crate::models::Notification;
use crate::settings::NotificationSettings;
use crate::store::{LocalStore, PaymentSource, StoreResult};

/// Dispatch errors.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{channel} delivery failed: {reason}")]
    Channel { channel: String, reason: String },

    #[error("{} of {total} channels failed", .failures.len())]
    Partial { failures: Vec<DispatchError>, total: usize },
}

/// Sends a notification to the user.
pub trait Dispatcher {
    fn dispatch(
        &self,
        notification: &Notification,
        settings: &NotificationSettings,
    ) -> Result<(), DispatchError>;
}

/// Stage of a medication dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DoseStage {
    /// Before the dose, within the pre-reminder lead time
    Pre,
    /// At the dose time
    Due,
    /// Well past the dose time and not taken
    Late,
}

impl DoseStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStage::Pre => "pre",
            DoseStage::Due => "due",
            DoseStage::Late => "late",
        }
    }
}

/// The three periodic sweeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum SweepKind {
    Reminder,
    DailyDigest,
    Medication,
}

impl SweepKind {
    pub const ALL: [SweepKind; 3] = [SweepKind::Reminder, SweepKind::DailyDigest, SweepKind::Medication];

    pub fn interval(&self) -> Duration {
        match self {
            SweepKind::Reminder => Duration::from_secs(60 * 60),
            SweepKind::DailyDigest => Duration::from_secs(5 * 60),
            SweepKind::Medication => Duration::from_secs(2 * 60),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Reminder => "reminder",
            SweepKind::DailyDigest => "daily-digest",
            SweepKind::Medication => "medication",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reminder" => Some(SweepKind::Reminder),
            "daily-digest" | "daily" => Some(SweepKind::DailyDigest),
            "medication" => Some(SweepKind::Medication),
            _ => None,
        }
    }

    fn enabled(&self, settings: &NotificationSettings) -> bool {
        match self {
            SweepKind::Reminder => settings.payment_reminders,
            SweepKind::DailyDigest => settings.daily_notifications,
            SweepKind::Medication => settings.medication_reminders,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Notifications recorded in the ledger (dispatched or attempted)
    pub sent: usize,
    /// Of those, how many had at least one channel fail
    pub dispatch_failures: usize,
    /// Ledger entries dropped by retention
    pub pruned: usize,
    /// False if the updated ledger could not be persisted
    pub ledger_saved: bool,
    /// True if the sweep's toggle is off
    pub disabled: bool,
}

/// Whether `now` is within `window_secs` of `target`.
pub fn within_window(now: NaiveDateTime, target: NaiveDateTime, window_secs: i64) -> bool {
    (now - target).num_seconds().abs() <= window_secs
}

/// Runs sweeps against a record source, a local store and a dispatcher.
pub struct SweepRunner<'a> {
    source: &'a dyn PaymentSource,
    store: &'a dyn LocalStore,
    dispatcher: &'a dyn Dispatcher,
}

impl<'a> SweepRunner<'a> {
    pub fn new(
        source: &'a dyn PaymentSource,
        store: &'a dyn LocalStore,
        dispatcher: &'a dyn Dispatcher,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
        }
    }

    /// Run one sweep for `user_id` at wall-clock time `now`.
    ///
    /// Errors loading settings, records or the ledger abort this sweep only.
    pub fn run(&self, kind: SweepKind, user_id: &str, now: NaiveDateTime) -> StoreResult<SweepReport> {
        let settings = self.store.load_settings()?.normalized();
        if !kind.enabled(&settings) {
            tracing::debug!(sweep = kind.as_str(), "sweep disabled");
            return Ok(SweepReport {
                disabled: true,
                ledger_saved: true,
                ..Default::default()
            });
        }

        let mut ledger = self.store.load_ledger()?;
        let pruned = ledger.prune(now);

        let notifications = match kind {
            SweepKind::Reminder => {
                let payments = self.source.list_payments(user_id)?;
                payment_notifications(&payments, &settings, &ledger, now)
            }
            SweepKind::DailyDigest => {
                let payments = self.source.list_payments(user_id)?;
                daily_digest(&payments, &settings, &ledger, now).into_iter().collect()
            }
            SweepKind::Medication => {
                let medications = self.source.list_medications(user_id)?;
                medication_notifications(&medications, &settings, &ledger, now)
            }
        };

        let mut report = SweepReport {
            pruned,
            ledger_saved: true,
            ..Default::default()
        };

        for notification in &notifications {
            ledger.record_sent(
                &notification.subject_id,
                notification.kind,
                notification.reference_date,
                now,
            );
            report.sent += 1;

            match self.dispatcher.dispatch(notification, &settings) {
                Ok(()) => tracing::info!(
                    sweep = kind.as_str(),
                    kind = notification.kind.as_str(),
                    subject = %notification.subject_id,
                    "notification sent"
                ),
                Err(e) => {
                    report.dispatch_failures += 1;
                    tracing::warn!(
                        sweep = kind.as_str(),
                        subject = %notification.subject_id,
                        error = %e,
                        "notification dispatch failed"
                    );
                }
            }
        }

        if report.sent > 0 || pruned > 0 {
            report.ledger_saved = self.save_ledger(&ledger, kind);
        }

        Ok(report)
    }

    fn save_ledger(&self, ledger: &Ledger, kind: SweepKind) -> bool {
        match self.store.save_ledger(ledger) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(sweep = kind.as_str(), error = %e, "failed to save notification history");
                false
            }
        }
    }
}
