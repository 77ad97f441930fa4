//! Payment reminder and daily digest evaluation.

use chrono::{NaiveDate, NaiveDateTime};

use super::messages::{self, DigestLine};
use super::within_window;
use crate::ledger::Ledger;
use crate::models::{Notification, NotificationKind, PaymentRecord};
use crate::recurrence::{compute_next_occurrence, RecurrenceEnd};
use crate::settings::NotificationSettings;

/// Subject ID of the daily digest in the ledger.
pub const DAILY_DIGEST_SUBJECT: &str = "daily-digest";

/// Half-width of the daily digest window, in seconds.
pub const DAILY_WINDOW_SECS: i64 = 5 * 60;

/// Date the payment is due next, as seen at `now`.
///
/// Recurring payments use the cached next date while it has not passed and
/// the engine otherwise. Recurring payments past the end of their series have
/// no due date.
pub fn effective_due_date(payment: &PaymentRecord, now: NaiveDateTime) -> Option<NaiveDate> {
    let Some(rule) = payment.rule() else {
        return payment.payment_date;
    };

    let today = now.date();
    let due = match payment.next_payment_date {
        Some(cached) if cached >= today => Some(cached),
        _ => compute_next_occurrence(&rule, now),
    }?;

    let end = RecurrenceEnd::from_payment(payment);
    if end.is_exhausted(&rule, payment.payment_date, due) {
        tracing::debug!(payment = %payment.id, %due, "recurring series has ended");
        return None;
    }
    Some(due)
}

/// Reminder and due-today notifications for unpaid payments, in storage order.
pub fn payment_notifications(
    payments: &[PaymentRecord],
    settings: &NotificationSettings,
    ledger: &Ledger,
    now: NaiveDateTime,
) -> Vec<Notification> {
    let today = now.date();
    let threshold = i64::from(settings.reminder_days);
    let mut notifications = Vec::new();

    for payment in payments.iter().filter(|p| !p.is_paid) {
        let Some(due) = effective_due_date(payment, now) else {
            tracing::debug!(payment = %payment.id, "no due date, skipping");
            continue;
        };

        let days_until = (due - today).num_days();
        let kind = match days_until {
            0 => NotificationKind::DueToday,
            d if d > 0 && d <= threshold => NotificationKind::Reminder,
            _ => continue,
        };

        if !ledger.should_notify(&payment.id, kind, due) {
            continue;
        }
        notifications.push(messages::payment_notification(kind, payment, due, days_until));
    }

    notifications
}

/// The daily digest, if it is time for it and there is something to report.
pub fn daily_digest(
    payments: &[PaymentRecord],
    settings: &NotificationSettings,
    ledger: &Ledger,
    now: NaiveDateTime,
) -> Option<Notification> {
    // today's target only, so a window near midnight cannot match twice
    let today = now.date();
    if !within_window(now, today.and_time(settings.daily_time()), DAILY_WINDOW_SECS) {
        return None;
    }

    if !ledger.should_notify(DAILY_DIGEST_SUBJECT, NotificationKind::Daily, today) {
        return None;
    }

    let horizon = today + chrono::Duration::days(i64::from(settings.reminder_days));
    let mut lines: Vec<DigestLine<'_>> = payments
        .iter()
        .filter(|p| !p.is_paid)
        .filter_map(|payment| {
            let due = effective_due_date(payment, now)?;
            (due <= horizon).then_some(DigestLine { payment, due })
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    lines.sort_by_key(|line| line.due);

    Some(messages::daily_digest(DAILY_DIGEST_SUBJECT, today, &lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecurrenceRule, RecurringType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn one_off(title: &str, due: NaiveDate) -> PaymentRecord {
        PaymentRecord::new("u1".into(), title.into(), 100.0, due)
    }

    #[test]
    fn test_reminder_window() {
        let settings = NotificationSettings::default(); // 3 days
        let payments = vec![
            one_off("today", date(2024, 3, 10)),
            one_off("in-2", date(2024, 3, 12)),
            one_off("in-3", date(2024, 3, 13)),
            one_off("in-4", date(2024, 3, 14)),
            one_off("overdue", date(2024, 3, 9)),
        ];
        let notifications =
            payment_notifications(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 12, 0));

        let kinds: Vec<_> = notifications.iter().map(|n| (n.subject_id.clone(), n.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (payments[0].id.clone(), NotificationKind::DueToday),
                (payments[1].id.clone(), NotificationKind::Reminder),
                (payments[2].id.clone(), NotificationKind::Reminder),
            ]
        );
    }

    #[test]
    fn test_paid_and_already_notified_are_skipped() {
        let settings = NotificationSettings::default();
        let mut paid = one_off("paid", date(2024, 3, 11));
        paid.is_paid = true;
        let pending = one_off("pending", date(2024, 3, 11));

        let mut ledger = Ledger::new();
        ledger.record_sent(&pending.id, NotificationKind::Reminder, date(2024, 3, 11), at(2024, 3, 9, 9, 0));

        let notifications =
            payment_notifications(&[paid, pending], &settings, &ledger, at(2024, 3, 10, 9, 0));
        assert!(notifications.is_empty());
    }

    #[test]
    fn test_cached_next_date_is_used() {
        let mut payment = one_off("Phone", date(2024, 1, 5));
        payment.make_recurring(RecurrenceRule::new(RecurringType::Monthly).with_day(5));
        payment.next_payment_date = Some(date(2024, 4, 5));

        assert_eq!(effective_due_date(&payment, at(2024, 3, 10, 9, 0)), Some(date(2024, 4, 5)));
        assert_eq!(effective_due_date(&one_off("Fee", date(2024, 3, 1)), at(2024, 3, 10, 9, 0)), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_stale_recurring_date_is_recomputed() {
        let mut payment = one_off("Phone", date(2024, 1, 12));
        payment.make_recurring(RecurrenceRule::new(RecurringType::Monthly).with_day(12));
        payment.next_payment_date = Some(date(2024, 2, 12));

        let now = at(2024, 3, 10, 9, 0);
        assert_eq!(effective_due_date(&payment, now), Some(date(2024, 3, 12)));
    }

    #[test]
    fn test_ended_series_has_no_due_date() {
        let mut payment = one_off("Loan", date(2024, 1, 12));
        payment.make_recurring(RecurrenceRule::new(RecurringType::Monthly).with_day(12));
        payment.recurring_end_count = Some(2);

        // Jan 12 and Feb 12 only
        assert_eq!(effective_due_date(&payment, at(2024, 2, 1, 9, 0)), Some(date(2024, 2, 12)));
        assert_eq!(effective_due_date(&payment, at(2024, 3, 1, 9, 0)), None);
    }

    #[test]
    fn test_daily_digest_window() {
        let settings = NotificationSettings::default(); // 09:00
        let payments = vec![one_off("Rent", date(2024, 3, 11))];

        assert!(daily_digest(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 8, 54)).is_none());
        assert!(daily_digest(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 8, 55)).is_some());
        assert!(daily_digest(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 9, 5)).is_some());
        assert!(daily_digest(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 9, 6)).is_none());
    }

    #[test]
    fn test_daily_digest_once_per_day() {
        let settings = NotificationSettings::default();
        let payments = vec![one_off("Rent", date(2024, 3, 9))];
        let mut ledger = Ledger::new();

        let first = daily_digest(&payments, &settings, &ledger, at(2024, 3, 10, 9, 0)).unwrap();
        assert!(first.body.contains("1 overdue"));
        ledger.record_sent(first.subject_id.as_str(), first.kind, first.reference_date, at(2024, 3, 10, 9, 0));

        assert!(daily_digest(&payments, &settings, &ledger, at(2024, 3, 10, 9, 3)).is_none());
        assert!(daily_digest(&payments, &settings, &ledger, at(2024, 3, 11, 9, 0)).is_some());
    }

    #[test]
    fn test_daily_digest_near_midnight_sends_once() {
        let settings = NotificationSettings {
            daily_time: "00:02".into(),
            ..Default::default()
        };
        let payments = vec![one_off("Rent", date(2024, 3, 11))];
        let mut ledger = Ledger::new();

        assert!(daily_digest(&payments, &settings, &ledger, at(2024, 3, 10, 23, 58)).is_none());

        let digest = daily_digest(&payments, &settings, &ledger, at(2024, 3, 11, 0, 1)).unwrap();
        assert_eq!(digest.reference_date, date(2024, 3, 11));
        ledger.record_sent(DAILY_DIGEST_SUBJECT, NotificationKind::Daily, date(2024, 3, 11), at(2024, 3, 11, 0, 1));
        assert!(daily_digest(&payments, &settings, &ledger, at(2024, 3, 11, 0, 4)).is_none());
    }

    #[test]
    fn test_huge_end_count_does_not_stall() {
        let mut payment = one_off("Gym", date(2024, 1, 1));
        payment.make_recurring(RecurrenceRule::new(RecurringType::Weekly).with_days([1]));
        payment.recurring_end_count = Some(u32::MAX);

        // 2024-03-10 is a Sunday
        assert_eq!(effective_due_date(&payment, at(2024, 3, 10, 9, 0)), Some(date(2024, 3, 11)));
    }

    #[test]
    fn test_daily_digest_nothing_to_report() {
        let settings = NotificationSettings::default();
        let payments = vec![one_off("Far away", date(2024, 6, 1))];
        assert!(daily_digest(&payments, &settings, &Ledger::new(), at(2024, 3, 10, 9, 0)).is_none());
    }
}
