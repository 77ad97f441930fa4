//! Termination conditions for recurring payments.
//!
//! The engine itself never stops a series; callers ask [`RecurrenceEnd`]
//! whether a computed occurrence is still inside the series.

use chrono::{Months, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::compute_next_occurrence;
use crate::models::{PaymentRecord, RecurrenceRule};

/// End conditions of a recurring series. The earliest applicable bound wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceEnd {
    /// Total number of occurrences, counting the first payment date. Zero means unbounded.
    pub count: Option<u32>,
    /// Months after the first payment date
    pub months: Option<u32>,
    /// Last allowed date
    pub date: Option<NaiveDate>,
}

impl RecurrenceEnd {
    pub fn from_payment(payment: &PaymentRecord) -> Self {
        Self {
            count: payment.recurring_end_count,
            months: payment.recurring_end_months,
            date: payment.recurring_end_date,
        }
    }

    /// Whether no end condition is set.
    pub fn is_open_ended(&self) -> bool {
        matches!(self.count, None | Some(0)) && self.months.is_none() && self.date.is_none()
    }

    /// Whether `occurrence` falls after the end of the series that starts
    /// on `start`.
    ///
    /// Count and month bounds need a start date; without one only the
    /// explicit end date applies.
    pub fn is_exhausted(
        &self,
        rule: &RecurrenceRule,
        start: Option<NaiveDate>,
        occurrence: NaiveDate,
    ) -> bool {
        if self.date.map_or(false, |last| occurrence > last) {
            return true;
        }
        let Some(start) = start else {
            return false;
        };
        let past_months = self
            .months
            .and_then(|months| start.checked_add_months(Months::new(months)))
            .map_or(false, |last| occurrence > last);
        if past_months {
            return true;
        }
        match self.count {
            Some(count) if count > 0 => past_count(rule, start, count, occurrence),
            _ => false,
        }
    }
}

/// Whether `occurrence` comes after the `count`-th occurrence of a series
/// whose first occurrence is `start`.
///
/// Walks the series only as far as `occurrence`, so the cost is bounded by
/// the dates involved rather than by `count`.
fn past_count(rule: &RecurrenceRule, start: NaiveDate, count: u32, occurrence: NaiveDate) -> bool {
    let mut current = start;
    for _ in 1..count {
        if current >= occurrence {
            return false;
        }
        match compute_next_occurrence(rule, current.and_time(NaiveTime::MIN)) {
            Some(next) => current = next,
            None => return false,
        }
    }
    occurrence > current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecurringType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_open_ended() {
        let end = RecurrenceEnd::default();
        let rule = RecurrenceRule::new(RecurringType::Daily);
        assert!(end.is_open_ended());
        assert!(!end.is_exhausted(&rule, Some(date(2024, 1, 1)), date(2030, 1, 1)));

        let zero = RecurrenceEnd { count: Some(0), ..Default::default() };
        assert!(zero.is_open_ended());
        assert!(!zero.is_exhausted(&rule, Some(date(2024, 1, 1)), date(2030, 1, 1)));
    }

    #[test]
    fn test_end_by_count() {
        let rule = RecurrenceRule::new(RecurringType::Monthly).with_day(15);
        let end = RecurrenceEnd { count: Some(3), ..Default::default() };
        let start = Some(date(2024, 1, 15));
        // Jan 15, Feb 15, Mar 15
        assert!(!end.is_exhausted(&rule, start, date(2024, 1, 15)));
        assert!(!end.is_exhausted(&rule, start, date(2024, 3, 15)));
        assert!(end.is_exhausted(&rule, start, date(2024, 4, 15)));
    }

    #[test]
    fn test_huge_count_is_cheap() {
        let rule = RecurrenceRule::new(RecurringType::Weekly).with_days([1]);
        let end = RecurrenceEnd { count: Some(u32::MAX), ..Default::default() };
        assert!(!end.is_exhausted(&rule, Some(date(2024, 1, 1)), date(2024, 3, 11)));

        let daily = RecurrenceRule::new(RecurringType::Daily);
        assert!(!end.is_exhausted(&daily, Some(date(2024, 1, 1)), date(2030, 1, 1)));
    }

    #[test]
    fn test_end_by_months() {
        let rule = RecurrenceRule::new(RecurringType::Weekly).with_days([1]);
        let end = RecurrenceEnd { months: Some(2), ..Default::default() };
        let start = Some(date(2024, 1, 31));
        assert!(!end.is_exhausted(&rule, start, date(2024, 3, 31)));
        assert!(end.is_exhausted(&rule, start, date(2024, 4, 1)));
    }

    #[test]
    fn test_earliest_bound_wins() {
        let rule = RecurrenceRule::new(RecurringType::Daily);
        let end = RecurrenceEnd {
            count: Some(10),
            months: Some(1),
            date: Some(date(2024, 1, 5)),
        };
        let start = Some(date(2024, 1, 1));
        assert!(!end.is_exhausted(&rule, start, date(2024, 1, 5)));
        assert!(end.is_exhausted(&rule, start, date(2024, 1, 6)));
    }

    #[test]
    fn test_count_without_start_is_ignored() {
        let rule = RecurrenceRule::new(RecurringType::Daily);
        let end = RecurrenceEnd { count: Some(2), ..Default::default() };
        assert!(!end.is_exhausted(&rule, None, date(2030, 1, 1)));
    }
}
