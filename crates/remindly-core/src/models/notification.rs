//! Notification and notification-history models.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of user-visible notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Payment due within the reminder threshold
    Reminder,
    /// Payment due today
    DueToday,
    /// Once-a-day digest
    Daily,
    /// Medication dose (pre-reminder, due or late)
    Medication,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::DueToday => "due-today",
            NotificationKind::Daily => "daily",
            NotificationKind::Medication => "medication",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reminder" => Some(NotificationKind::Reminder),
            "due-today" => Some(NotificationKind::DueToday),
            "daily" => Some(NotificationKind::Daily),
            "medication" => Some(NotificationKind::Medication),
            _ => None,
        }
    }
}

/// One dispatched notification, kept for de-duplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHistoryEntry {
    /// Payment ID, medication dose subject or digest subject
    pub subject_id: String,
    pub kind: NotificationKind,
    /// Local wall-clock time of dispatch
    #[serde(deserialize_with = "local_date_time")]
    pub sent_at: NaiveDateTime,
    /// Payment date the notification is about, or the day it was sent for
    /// daily and medication kinds
    pub reference_date: NaiveDate,
}

/// Read a naive local timestamp, or an RFC 3339 timestamp with an offset
/// (as older stores wrote it) converted to local time.
fn local_date_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Ok(naive);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Local).naive_local())
        .map_err(serde::de::Error::custom)
}

/// A notification ready to be handed to a dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject_id: String,
    pub reference_date: NaiveDate,
    pub title: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::DueToday).unwrap(),
            "\"due-today\""
        );
        for kind in [
            NotificationKind::Reminder,
            NotificationKind::DueToday,
            NotificationKind::Daily,
            NotificationKind::Medication,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("weekly"), None);
    }

    #[test]
    fn test_history_entry_json() {
        let json = r#"{"subjectId":"p1","kind":"reminder","sentAt":"2024-03-01T09:00:00","referenceDate":"2024-03-04"}"#;
        let entry: NotificationHistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, NotificationKind::Reminder);
        assert_eq!(entry.reference_date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
    }

    #[test]
    fn test_history_entry_with_utc_offset() {
        let json = r#"{"subjectId":"p1","kind":"reminder","sentAt":"2024-03-01T09:00:00.000Z","referenceDate":"2024-03-04"}"#;
        let entry: NotificationHistoryEntry = serde_json::from_str(json).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(entry.sent_at, expected);

        let fractional = json.replace("09:00:00.000Z", "09:00:00.250");
        let entry: NotificationHistoryEntry = serde_json::from_str(&fractional).unwrap();
        assert_eq!(entry.sent_at.format("%H:%M:%S%.3f").to_string(), "09:00:00.250");

        let bad = json.replace("2024-03-01T09:00:00.000Z", "yesterday");
        assert!(serde_json::from_str::<NotificationHistoryEntry>(&bad).is_err());
    }
}
