//! Notification de-duplication ledger.
//!
//! The ledger is a rolling list of dispatched notifications. Before any
//! user-visible notification is sent, [`Ledger::should_notify`] is asked
//! whether the same notification already went out:
//!
//! - `reminder`, `due-today`, `medication`: keyed by
//!   `(subject_id, kind, reference_date)`;
//! - `daily`: keyed by `(subject_id, kind, day of sent_at)`.
//!
//! Entries older than [`RETENTION_DAYS`] are dropped on every write and
//! whenever a sweep loads the ledger.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{NotificationHistoryEntry, NotificationKind};

/// How long history entries are kept.
pub const RETENTION_DAYS: i64 = 30;

/// Rolling notification history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<NotificationHistoryEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<NotificationHistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[NotificationHistoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<NotificationHistoryEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a notification for this key has not been sent yet.
    pub fn should_notify(
        &self,
        subject_id: &str,
        kind: NotificationKind,
        reference_date: NaiveDate,
    ) -> bool {
        !self
            .entries
            .iter()
            .any(|entry| matches_key(entry, subject_id, kind, reference_date))
    }

    /// Record a dispatched notification, dropping expired entries first.
    pub fn record_sent(
        &mut self,
        subject_id: &str,
        kind: NotificationKind,
        reference_date: NaiveDate,
        now: NaiveDateTime,
    ) {
        self.prune(now);
        self.entries.push(NotificationHistoryEntry {
            subject_id: subject_id.to_string(),
            kind,
            sent_at: now,
            reference_date,
        });
    }

    /// Drop entries sent more than [`RETENTION_DAYS`] before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: NaiveDateTime) -> usize {
        let cutoff = now - Duration::days(RETENTION_DAYS);
        let before = self.entries.len();
        self.entries.retain(|entry| entry.sent_at >= cutoff);
        before - self.entries.len()
    }
}

fn matches_key(
    entry: &NotificationHistoryEntry,
    subject_id: &str,
    kind: NotificationKind,
    reference_date: NaiveDate,
) -> bool {
    if entry.kind != kind || entry.subject_id != subject_id {
        return false;
    }
    match kind {
        NotificationKind::Daily => entry.sent_at.date() == reference_date,
        _ => entry.reference_date == reference_date,
    }
}
