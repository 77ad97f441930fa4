//! Notification wording.

use chrono::{NaiveDate, NaiveTime};

use crate::models::{MedicationRecord, Notification, NotificationKind, PaymentRecord};

use super::DoseStage;

fn amount(value: f64) -> String {
    format!("{:.2}", value)
}

fn days_phrase(days: i64) -> String {
    match days {
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

/// Upcoming or due-today payment.
pub fn payment_notification(
    kind: NotificationKind,
    payment: &PaymentRecord,
    due: NaiveDate,
    days_until: i64,
) -> Notification {
    let (title, body) = if kind == NotificationKind::DueToday {
        (
            format!("Payment due today: {}", payment.title),
            format!("{} of {} is due today.", payment.title, amount(payment.amount)),
        )
    } else {
        (
            format!("Upcoming payment: {}", payment.title),
            format!(
                "{} of {} is due {} ({}).",
                payment.title,
                amount(payment.amount),
                days_phrase(days_until),
                due.format("%d.%m.%Y")
            ),
        )
    };

    Notification {
        kind,
        subject_id: payment.id.clone(),
        reference_date: due,
        title,
        body,
    }
}

/// One line of the daily digest.
pub struct DigestLine<'a> {
    pub payment: &'a PaymentRecord,
    pub due: NaiveDate,
}

/// Daily summary of unpaid payments.
pub fn daily_digest(subject_id: &str, today: NaiveDate, lines: &[DigestLine<'_>]) -> Notification {
    let overdue = lines.iter().filter(|l| l.due < today).count();
    let due_today = lines.iter().filter(|l| l.due == today).count();

    let mut body = format!(
        "{} unpaid: {} due today, {} overdue.",
        lines.len(),
        due_today,
        overdue
    );
    for line in lines {
        let when = if line.due < today {
            format!("overdue since {}", line.due.format("%d.%m"))
        } else if line.due == today {
            "today".to_string()
        } else {
            line.due.format("%d.%m").to_string()
        };
        body.push_str(&format!(
            "\n- {}: {} ({})",
            line.payment.title,
            amount(line.payment.amount),
            when
        ));
    }

    Notification {
        kind: NotificationKind::Daily,
        subject_id: subject_id.to_string(),
        reference_date: today,
        title: "Daily payment summary".to_string(),
        body,
    }
}

/// Medication dose reminder for one stage of one dose.
pub fn medication_notification(
    medication: &MedicationRecord,
    dose: NaiveTime,
    stage: DoseStage,
    subject_id: String,
    dose_day: NaiveDate,
    minutes: i64,
) -> Notification {
    let name = match &medication.dosage {
        Some(dosage) => format!("{} {}", medication.name, dosage),
        None => medication.name.clone(),
    };
    let at = dose.format("%H:%M");

    let (title, body) = match stage {
        DoseStage::Pre => (
            format!("Upcoming dose: {}", medication.name),
            format!("Take {} in {} min (at {}).", name, minutes, at),
        ),
        DoseStage::Due => (
            format!("Time for {}", medication.name),
            format!("Take {} now (scheduled {}).", name, at),
        ),
        DoseStage::Late => (
            format!("Missed dose: {}", medication.name),
            format!("{} was due at {}, {} min ago. Take it if still appropriate.", name, at, minutes),
        ),
    };

    Notification {
        kind: NotificationKind::Medication,
        subject_id,
        reference_date: dose_day,
        title,
        body,
    }
}
