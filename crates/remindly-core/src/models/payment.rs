//! Payment (check/bill) models.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How often a recurring payment repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecurringType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringType::Daily => "daily",
            RecurringType::Weekly => "weekly",
            RecurringType::Monthly => "monthly",
            RecurringType::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(RecurringType::Daily),
            "weekly" => Some(RecurringType::Weekly),
            "monthly" => Some(RecurringType::Monthly),
            "yearly" => Some(RecurringType::Yearly),
            _ => None,
        }
    }
}

/// The recurrence fields of a payment, detached from the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub recurring_type: RecurringType,
    /// Day of month (1-31) for monthly, legacy single weekday (1-7) for weekly
    #[serde(default)]
    pub recurring_day: Option<u32>,
    /// Selected weekdays, Monday=1..Sunday=7. Wins over `recurring_day` when non-empty.
    #[serde(default)]
    pub recurring_days: BTreeSet<u32>,
    /// Base date; required for yearly rules
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(recurring_type: RecurringType) -> Self {
        Self {
            recurring_type,
            recurring_day: None,
            recurring_days: BTreeSet::new(),
            payment_date: None,
        }
    }

    pub fn with_day(mut self, day: u32) -> Self {
        self.recurring_day = Some(day);
        self
    }

    pub fn with_days<I: IntoIterator<Item = u32>>(mut self, days: I) -> Self {
        self.recurring_days = days.into_iter().collect();
        self
    }

    pub fn with_payment_date(mut self, date: NaiveDate) -> Self {
        self.payment_date = Some(date);
        self
    }
}

/// A check or bill owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// Unique record ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Display name (payee, bill name)
    pub title: String,
    /// Amount due
    pub amount: f64,
    /// Due date of a one-off payment, base date of a recurring one
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    pub is_paid: bool,
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_type: Option<RecurringType>,
    #[serde(default)]
    pub recurring_day: Option<u32>,
    #[serde(default)]
    pub recurring_days: BTreeSet<u32>,
    /// Stop after this many occurrences
    #[serde(default)]
    pub recurring_end_count: Option<u32>,
    /// Stop this many months after `payment_date`
    #[serde(default)]
    pub recurring_end_months: Option<u32>,
    /// Stop after this date
    #[serde(default)]
    pub recurring_end_date: Option<NaiveDate>,
    /// Cached output of the recurrence engine
    #[serde(default)]
    pub next_payment_date: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl PaymentRecord {
    /// Create a one-off payment.
    pub fn new(user_id: String, title: String, amount: f64, payment_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            title,
            amount,
            payment_date: Some(payment_date),
            is_paid: false,
            is_recurring: false,
            recurring_type: None,
            recurring_day: None,
            recurring_days: BTreeSet::new(),
            recurring_end_count: None,
            recurring_end_months: None,
            recurring_end_date: None,
            next_payment_date: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Turn this payment into a recurring one following `rule`.
    pub fn make_recurring(&mut self, rule: RecurrenceRule) {
        self.is_recurring = true;
        self.recurring_type = Some(rule.recurring_type);
        self.recurring_day = rule.recurring_day;
        self.recurring_days = rule.recurring_days;
        if rule.payment_date.is_some() {
            self.payment_date = rule.payment_date;
        }
    }

    /// The recurrence rule, if this payment recurs.
    pub fn rule(&self) -> Option<RecurrenceRule> {
        if !self.is_recurring {
            return None;
        }
        Some(RecurrenceRule {
            recurring_type: self.recurring_type?,
            recurring_day: self.recurring_day,
            recurring_days: self.recurring_days.clone(),
            payment_date: self.payment_date,
        })
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_payment_is_one_off() {
        let payment = PaymentRecord::new("user-1".into(), "Rent".into(), 950.0, date(2024, 3, 1));
        assert!(!payment.is_recurring);
        assert!(payment.rule().is_none());
        assert_eq!(payment.payment_date, Some(date(2024, 3, 1)));
        assert_eq!(payment.id.len(), 36);
    }

    #[test]
    fn test_make_recurring_builds_rule() {
        let mut payment =
            PaymentRecord::new("user-1".into(), "Gym".into(), 30.0, date(2024, 3, 1));
        payment.make_recurring(RecurrenceRule::new(RecurringType::Weekly).with_days([1, 5]));

        let rule = payment.rule().unwrap();
        assert_eq!(rule.recurring_type, RecurringType::Weekly);
        assert_eq!(rule.recurring_days.len(), 2);
        assert_eq!(rule.payment_date, Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_json_field_names() {
        let json = r#"{
            "id": "p1",
            "userId": "u1",
            "title": "Insurance",
            "amount": 120.5,
            "paymentDate": "2024-12-25",
            "isPaid": false,
            "isRecurring": true,
            "recurringType": "yearly",
            "recurringDays": [],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let payment: PaymentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(payment.recurring_type, Some(RecurringType::Yearly));
        assert_eq!(payment.payment_date, Some(date(2024, 12, 25)));
        assert!(payment.next_payment_date.is_none());
    }
}
