//! Recurring payment date engine.
//!
//! Given a [`RecurrenceRule`] and the current wall-clock time, computes the
//! next calendar date on which a recurring payment is due:
//!
//! | Type    | Next occurrence                                              |
//! |---------|--------------------------------------------------------------|
//! | daily   | tomorrow                                                     |
//! | weekly  | nearest selected weekday strictly after today (never today)  |
//! | monthly | `recurring_day` this month, or next month once it has passed |
//! | yearly  | `payment_date`'s month/day this year, or next year           |
//!
//! Days that do not exist in a month (31st in April, 29th of February in a
//! common year) are clamped to the last day of that month.

mod end;

pub use end::*;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::{RecurrenceRule, RecurringType};

/// Compute the next occurrence of `rule` after `now`.
///
/// Returns `None` when the rule cannot be scheduled (a yearly rule without a
/// base `payment_date`, or a date past the end of the calendar).
pub fn compute_next_occurrence(rule: &RecurrenceRule, now: NaiveDateTime) -> Option<NaiveDate> {
    let today = now.date();
    match rule.recurring_type {
        RecurringType::Daily => today.succ_opt(),
        RecurringType::Weekly => next_weekly(rule, today),
        RecurringType::Monthly => next_monthly(rule, today),
        RecurringType::Yearly => next_yearly(rule, today),
    }
}

/// The next `count` occurrences of `rule` after `now`, in order.
///
/// Stops early if the rule cannot be scheduled.
pub fn upcoming_occurrences(rule: &RecurrenceRule, now: NaiveDateTime, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut cursor = now;
    while dates.len() < count {
        let Some(next) = compute_next_occurrence(rule, cursor) else {
            break;
        };
        dates.push(next);
        cursor = next.and_time(now.time());
    }
    dates
}

/// Weekdays selected by the rule, numbered Sunday=0..Saturday=6.
///
/// A non-empty `recurring_days` always takes precedence over the legacy
/// `recurring_day`.
fn selected_weekdays(rule: &RecurrenceRule) -> Vec<u32> {
    let selected: Vec<u32> = if rule.recurring_days.is_empty() {
        rule.recurring_day.into_iter().collect()
    } else {
        rule.recurring_days.iter().copied().collect()
    };

    selected
        .into_iter()
        .filter(|day| (1..=7).contains(day))
        .map(|day| day % 7)
        .collect()
}

fn next_weekly(rule: &RecurrenceRule, today: NaiveDate) -> Option<NaiveDate> {
    let mut targets = selected_weekdays(rule);
    if targets.is_empty() {
        // Nothing usable selected: repeat on the base date's weekday
        let anchor = rule.payment_date.unwrap_or(today);
        targets.push(anchor.weekday().num_days_from_sunday());
    }

    let current = i64::from(today.weekday().num_days_from_sunday());
    let diff = targets
        .iter()
        .map(|&target| {
            let mut diff = (i64::from(target) - current + 7) % 7;
            if diff <= 0 {
                diff += 7;
            }
            diff
        })
        .min()
        .unwrap_or(7);

    today.checked_add_signed(Duration::days(diff))
}

fn next_monthly(rule: &RecurrenceRule, today: NaiveDate) -> Option<NaiveDate> {
    let day = rule
        .recurring_day
        .or_else(|| rule.payment_date.map(|d| d.day()))
        .unwrap_or_else(|| today.day())
        .clamp(1, 31);

    let candidate = clamped_date(today.year(), today.month(), day)?;
    if candidate > today {
        return Some(candidate);
    }

    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    clamped_date(year, month, day)
}

fn next_yearly(rule: &RecurrenceRule, today: NaiveDate) -> Option<NaiveDate> {
    let base = rule.payment_date?;
    let candidate = clamped_date(today.year(), base.month(), base.day())?;
    if candidate > today {
        return Some(candidate);
    }
    clamped_date(today.year() + 1, base.month(), base.day())
}

/// `year-month-day`, with `day` clamped to the length of the month.
pub(crate) fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}
