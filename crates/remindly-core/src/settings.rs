//! User notification settings.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::parse_clock_time;

const DEFAULT_DAILY_TIME: &str = "09:00";

/// Settings validation errors.
#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("Invalid daily notification time: {0}")]
    InvalidDailyTime(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Scalar settings read once per sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Remind this many days before a payment is due
    pub reminder_days: u32,
    /// Daily digest time, "HH:MM"
    pub daily_time: String,
    /// Pre-reminder lead time for medication doses
    pub medication_reminder_minutes: u32,
    pub payment_reminders: bool,
    pub daily_notifications: bool,
    pub medication_reminders: bool,
    pub telegram_enabled: bool,
    pub telegram_chat_id: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            reminder_days: 3,
            daily_time: DEFAULT_DAILY_TIME.to_string(),
            medication_reminder_minutes: 15,
            payment_reminders: true,
            daily_notifications: true,
            medication_reminders: true,
            telegram_enabled: false,
            telegram_chat_id: None,
        }
    }
}

impl NotificationSettings {
    pub const MAX_REMINDER_DAYS: u32 = 60;
    pub const MAX_MEDICATION_REMINDER_MINUTES: u32 = 240;

    /// Check values a user submitted.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if parse_clock_time(&self.daily_time).is_none() {
            return Err(SettingsError::InvalidDailyTime(self.daily_time.clone()));
        }
        if self.reminder_days > Self::MAX_REMINDER_DAYS {
            return Err(SettingsError::OutOfRange {
                field: "reminderDays",
                value: self.reminder_days,
            });
        }
        if self.medication_reminder_minutes > Self::MAX_MEDICATION_REMINDER_MINUTES {
            return Err(SettingsError::OutOfRange {
                field: "medicationReminderMinutes",
                value: self.medication_reminder_minutes,
            });
        }
        Ok(())
    }

    /// Clamp stored values into range so a bad file never stops a sweep.
    pub fn normalized(mut self) -> Self {
        self.reminder_days = self.reminder_days.min(Self::MAX_REMINDER_DAYS);
        self.medication_reminder_minutes = self
            .medication_reminder_minutes
            .min(Self::MAX_MEDICATION_REMINDER_MINUTES);
        if parse_clock_time(&self.daily_time).is_none() {
            tracing::warn!(daily_time = %self.daily_time, "invalid daily time, using default");
            self.daily_time = DEFAULT_DAILY_TIME.to_string();
        }
        self.telegram_chat_id = self
            .telegram_chat_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        self
    }

    /// Parsed daily digest time.
    pub fn daily_time(&self) -> NaiveTime {
        parse_clock_time(&self.daily_time)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}
