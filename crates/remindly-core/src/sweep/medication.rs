//! Medication dose evaluation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::messages;
use super::DoseStage;
use crate::ledger::Ledger;
use crate::models::{MedicationRecord, Notification, NotificationKind};
use crate::settings::NotificationSettings;

/// Half-width of the "take it now" window, in seconds.
pub const DUE_WINDOW_SECS: i64 = 2 * 60;

/// Minutes past the dose time after which the dose counts as late.
pub const LATE_AFTER_MINUTES: i64 = 30;

/// A dose taken up to this many minutes early counts for that dose.
pub const EARLY_TAKE_MINUTES: i64 = 60;

/// Ledger subject for one stage of one dose.
pub fn dose_subject(medication_id: &str, dose: NaiveTime, stage: DoseStage) -> String {
    format!("{}@{}:{}", medication_id, dose.format("%H:%M"), stage.as_str())
}

/// Which stage of a dose `now` falls into, with the minutes to report.
fn dose_stage(
    medication: &MedicationRecord,
    dose_at: NaiveDateTime,
    now: NaiveDateTime,
    pre_minutes: i64,
) -> Option<(DoseStage, i64)> {
    let early = EARLY_TAKE_MINUTES.max(pre_minutes);
    if medication.taken_since(dose_at, early) {
        return None;
    }

    let delta_secs = (now - dose_at).num_seconds();
    if delta_secs.abs() <= DUE_WINDOW_SECS {
        return Some((DoseStage::Due, 0));
    }
    if delta_secs >= LATE_AFTER_MINUTES * 60 {
        return Some((DoseStage::Late, delta_secs / 60));
    }
    if delta_secs < 0 && pre_minutes > 0 && -delta_secs <= pre_minutes * 60 {
        // round up so "in 0 min" is never reported
        let minutes_until = (-delta_secs + 59) / 60;
        return Some((DoseStage::Pre, minutes_until));
    }
    None
}

/// Dose notifications for scheduled medications.
///
/// Doses close to midnight are matched against the neighbouring day too:
/// the pre-reminder and due stages look at yesterday, today and tomorrow,
/// while a dose is only reported late for today. A dose in its pre or due
/// window is never also reported late. The ledger reference date is the
/// day of the matched dose.
pub fn medication_notifications(
    medications: &[MedicationRecord],
    settings: &NotificationSettings,
    ledger: &Ledger,
    now: NaiveDateTime,
) -> Vec<Notification> {
    let today = now.date();
    let days: Vec<NaiveDate> = [today.pred_opt(), Some(today), today.succ_opt()]
        .into_iter()
        .flatten()
        .collect();
    let pre_minutes = i64::from(settings.medication_reminder_minutes);
    let mut notifications = Vec::new();

    for medication in medications {
        for dose in medication.dose_times() {
            let matched = days
                .iter()
                .filter(|day| medication.is_scheduled_on(**day))
                .filter_map(|day| {
                    dose_stage(medication, day.and_time(dose), now, pre_minutes)
                        .map(|(stage, minutes)| (*day, stage, minutes))
                })
                .filter(|(day, stage, _)| *stage != DoseStage::Late || *day == today)
                .min_by_key(|(_, stage, _)| *stage == DoseStage::Late);
            let Some((day, stage, minutes)) = matched else {
                continue;
            };

            let subject = dose_subject(&medication.id, dose, stage);
            if !ledger.should_notify(&subject, NotificationKind::Medication, day) {
                continue;
            }
            notifications.push(messages::medication_notification(
                medication, dose, stage, subject, day, minutes,
            ));
        }
    }

    notifications
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn med() -> MedicationRecord {
        MedicationRecord::new("u1".into(), "Metformin".into(), vec!["08:00".into()])
    }

    fn stages_at(now: NaiveDateTime, medication: &MedicationRecord) -> Vec<String> {
        let settings = NotificationSettings::default(); // 15 min pre-reminder
        medication_notifications(std::slice::from_ref(medication), &settings, &Ledger::new(), now)
            .into_iter()
            .map(|n| n.subject_id)
            .collect()
    }

    #[test]
    fn test_stages() {
        let m = med();
        let subject = |stage: &str| format!("{}@08:00:{}", m.id, stage);

        assert!(stages_at(at(7, 40), &m).is_empty());
        assert_eq!(stages_at(at(7, 45), &m), vec![subject("pre")]);
        assert_eq!(stages_at(at(7, 58), &m), vec![subject("due")]);
        assert_eq!(stages_at(at(8, 2), &m), vec![subject("due")]);
        assert!(stages_at(at(8, 10), &m).is_empty());
        assert_eq!(stages_at(at(8, 30), &m), vec![subject("late")]);
        assert_eq!(stages_at(at(13, 0), &m), vec![subject("late")]);
    }

    #[test]
    fn test_taken_dose_is_quiet() {
        let mut m = med();
        m.last_taken = Some(at(7, 50));
        assert!(stages_at(at(8, 0), &m).is_empty());
        assert!(stages_at(at(9, 0), &m).is_empty());

        // yesterday's dose does not count for today
        m.last_taken = Some(at(7, 50) - chrono::Duration::days(1));
        assert_eq!(stages_at(at(9, 0), &m).len(), 1);
    }

    #[test]
    fn test_each_stage_once_per_day() {
        let m = med();
        let settings = NotificationSettings::default();
        let mut ledger = Ledger::new();

        let first = medication_notifications(std::slice::from_ref(&m), &settings, &ledger, at(8, 0));
        assert_eq!(first.len(), 1);
        ledger.record_sent(&first[0].subject_id, first[0].kind, first[0].reference_date, at(8, 0));

        assert!(medication_notifications(std::slice::from_ref(&m), &settings, &ledger, at(8, 1)).is_empty());
        // the late stage is a different subject
        assert_eq!(
            medication_notifications(std::slice::from_ref(&m), &settings, &ledger, at(8, 40)).len(),
            1
        );
    }

    #[test]
    fn test_pre_reminder_disabled() {
        let m = med();
        let settings = NotificationSettings {
            medication_reminder_minutes: 0,
            ..Default::default()
        };
        assert!(medication_notifications(std::slice::from_ref(&m), &settings, &Ledger::new(), at(7, 45)).is_empty());
    }

    #[test]
    fn test_midnight_dose_is_due_not_late() {
        let m = MedicationRecord::new("u1".into(), "Levothyroxine".into(), vec!["00:00".into()]);
        let subject = |stage: &str| format!("{}@00:00:{}", m.id, stage);
        let tomorrow = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

        assert_eq!(stages_at(at(23, 50), &m), vec![subject("pre")]);
        assert_eq!(stages_at(at(23, 59), &m), vec![subject("due")]);
        assert_eq!(stages_at(at(23, 0), &m), vec![subject("late")]);

        let settings = NotificationSettings::default();
        let due = medication_notifications(std::slice::from_ref(&m), &settings, &Ledger::new(), at(23, 59));
        assert_eq!(due[0].reference_date, tomorrow);

        // the same dose seen again just after midnight is not repeated
        let mut ledger = Ledger::new();
        ledger.record_sent(&due[0].subject_id, due[0].kind, due[0].reference_date, at(23, 59));
        let after = tomorrow.and_hms_opt(0, 1, 0).unwrap();
        assert!(medication_notifications(std::slice::from_ref(&m), &settings, &ledger, after).is_empty());
    }

    #[test]
    fn test_late_evening_dose_due_after_midnight() {
        let m = MedicationRecord::new("u1".into(), "Melatonin".into(), vec!["23:59".into()]);
        let after = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap().and_hms_opt(0, 1, 0).unwrap();
        assert_eq!(stages_at(after, &m), vec![format!("{}@23:59:due", m.id)]);
    }

    #[test]
    fn test_inactive_medication_skipped() {
        let mut m = med();
        m.active = false;
        assert!(stages_at(at(8, 0), &m).is_empty());
    }
}
