//! Medication schedule models.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A medication with daily dose times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    /// Unique record ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Medication name
    pub name: String,
    /// Free-form dosage (e.g., "500mg", "2 tablets")
    #[serde(default)]
    pub dosage: Option<String>,
    /// Dose times of day as "HH:MM"
    #[serde(default)]
    pub times: Vec<String>,
    pub active: bool,
    /// First day of the course
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last day of the course
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// When the user last confirmed a dose
    #[serde(default)]
    pub last_taken: Option<NaiveDateTime>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl MedicationRecord {
    /// Create an active medication with the given dose times.
    pub fn new(user_id: String, name: String, times: Vec<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            name,
            dosage: None,
            times,
            active: true,
            start_date: None,
            end_date: None,
            last_taken: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Parsed dose times, sorted. Malformed entries are skipped.
    pub fn dose_times(&self) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = self
            .times
            .iter()
            .filter_map(|t| {
                let parsed = parse_clock_time(t);
                if parsed.is_none() {
                    tracing::debug!(medication = %self.id, time = %t, "skipping malformed dose time");
                }
                parsed
            })
            .collect();
        times.sort();
        times.dedup();
        times
    }

    /// Whether the course is running on `day`.
    pub fn is_scheduled_on(&self, day: NaiveDate) -> bool {
        self.active
            && self.start_date.map_or(true, |start| day >= start)
            && self.end_date.map_or(true, |end| day <= end)
    }

    /// Whether the dose at `dose` was confirmed taken.
    ///
    /// Taking a dose a little early still counts for that dose.
    pub fn taken_since(&self, dose: NaiveDateTime, early_minutes: i64) -> bool {
        self.last_taken
            .map_or(false, |taken| taken >= dose - chrono::Duration::minutes(early_minutes))
    }
}

/// Parse a "HH:MM" (or "HH:MM:SS") wall-clock time.
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}
